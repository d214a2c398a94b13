//! 服务错误类型定义
//!
//! 将核心层的 `LoyaltyError` 映射为 HTTP 状态码与对外错误码。
//! 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use loyalty_shared::error::LoyaltyError;

/// API 错误类型
#[derive(Debug, Error)]
pub enum ApiError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("登录名或密码错误")]
    InvalidCredentials,

    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 冲突
    #[error("登录名已被占用")]
    LoginTaken,
    #[error("订单已由其他用户上传")]
    OrderOwnedByOther,

    // 订单号不可处理
    #[error("订单号无效: {0}")]
    InvalidOrderNumber(String),
    #[error("该订单号已存在提现记录")]
    WithdrawalDuplicate,

    // 余额不足
    #[error("积分余额不足")]
    InsufficientFunds,

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::LoginTaken | Self::OrderOwnedByOther => StatusCode::CONFLICT,
            Self::InvalidOrderNumber(_) | Self::WithdrawalDuplicate => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::LoginTaken => "LOGIN_TAKEN",
            Self::OrderOwnedByOther => "ORDER_OWNED_BY_OTHER",
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::WithdrawalDuplicate => "WITHDRAWAL_DUPLICATE",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "code": self.error_code(),
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从核心层错误转换
///
/// 核心层的瞬时错误在到达这里时已经耗尽重试，统一归为 500。
impl From<LoyaltyError> for ApiError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::LoginTaken { .. } => Self::LoginTaken,
            LoyaltyError::OrderOwnedByOther { .. } => Self::OrderOwnedByOther,
            LoyaltyError::InvalidOrderNumber { number } => Self::InvalidOrderNumber(number),
            LoyaltyError::WithdrawalDuplicate { .. } => Self::WithdrawalDuplicate,
            LoyaltyError::InsufficientFunds { .. } => Self::InsufficientFunds,
            LoyaltyError::Validation(msg) => Self::Validation(msg),
            LoyaltyError::Database(e) => Self::Database(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

//! 余额与提现相关的 HTTP 处理器

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{Withdrawal, money};
use crate::repository::traits::LedgerStore;
use crate::state::AppState;

/// 余额响应 DTO
#[derive(Debug, Serialize)]
pub struct BalanceDto {
    pub current: f64,
    pub withdrawn: f64,
}

/// 提现请求
#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawRequest {
    #[validate(length(min = 1, message = "订单号不能为空"))]
    pub order: String,
    pub sum: f64,
}

/// 提现记录响应 DTO
#[derive(Debug, Serialize)]
pub struct WithdrawalDto {
    pub order: String,
    pub sum: f64,
    pub processed_at: DateTime<Utc>,
}

impl From<&Withdrawal> for WithdrawalDto {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            order: withdrawal.order_id.to_string(),
            sum: money::to_decimal(withdrawal.sum),
            processed_at: withdrawal.processed_at,
        }
    }
}

/// 查询余额
///
/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BalanceDto>> {
    let balance = state.ledger.balance(user.id).await?;

    Ok(Json(BalanceDto {
        current: money::to_decimal(balance.current),
        withdrawn: money::to_decimal(balance.withdrawn),
    }))
}

/// 积分提现
///
/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Response> {
    req.validate()?;

    state
        .withdraw_service
        .withdraw(user.id, &req.order, req.sum)
        .await?;

    tracing::info!(user_id = user.id, order = %req.order, sum = req.sum, "积分提现成功");

    Ok((StatusCode::OK, Json(json!({ "message": "提现成功" }))).into_response())
}

/// 提现记录列表
///
/// GET /api/user/withdrawals
///
/// 按处理时间倒序；没有记录时返回 204。
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let withdrawals = state.ledger.withdrawals_by_user(user.id).await?;

    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalDto> = withdrawals.iter().map(WithdrawalDto::from).collect();
    Ok(Json(body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_dto_two_decimal_shape() {
        let body = serde_json::to_value(BalanceDto {
            current: money::to_decimal(550),
            withdrawn: money::to_decimal(300),
        })
        .unwrap();

        assert_eq!(body["current"], 5.5);
        assert_eq!(body["withdrawn"], 3.0);
    }

    #[test]
    fn test_withdrawal_dto_shape() {
        let withdrawal = Withdrawal {
            order_id: 79927398713,
            user_id: 1,
            sum: 300,
            processed_at: "2024-06-01T12:00:00Z".parse().unwrap(),
        };

        let body = serde_json::to_value(WithdrawalDto::from(&withdrawal)).unwrap();
        assert_eq!(body["order"], "79927398713");
        assert_eq!(body["sum"], 3.0);
        assert_eq!(body["processed_at"], "2024-06-01T12:00:00Z");
    }

    #[test]
    fn test_withdraw_request_validation() {
        let ok = WithdrawRequest {
            order: "79927398713".to_string(),
            sum: 3.0,
        };
        assert!(ok.validate().is_ok());

        let empty_order = WithdrawRequest {
            order: String::new(),
            sum: 3.0,
        };
        assert!(empty_order.validate().is_err());
    }
}

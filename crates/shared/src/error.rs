//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 瞬时故障与业务逻辑错误通过 `is_retryable` 区分，重试执行器只重试前者。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 用户错误 ====================
    #[error("登录名已被占用: {login}")]
    LoginTaken { login: String },

    // ==================== 订单错误 ====================
    #[error("订单已由其他用户上传: {number}")]
    OrderOwnedByOther { number: i64 },

    #[error("订单已处于终态，不可再变更: {number}")]
    OrderAlreadyFinal { number: i64 },

    #[error("订单号无效: {number}")]
    InvalidOrderNumber { number: String },

    // ==================== 账本错误 ====================
    #[error("积分余额不足: 需要 {required}, 实际 {available}")]
    InsufficientFunds { required: i32, available: i32 },

    #[error("该订单号已存在提现记录: {number}")]
    WithdrawalDuplicate { number: i64 },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 是否为可重试错误
    ///
    /// 仅瞬时类故障（网络抖动、连接池耗尽、死锁/串行化冲突、外部服务 5xx）
    /// 可重试；业务逻辑错误直接向上传播。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => is_transient_db_error(e),
            Self::ExternalService { .. } => true,
            _ => false,
        }
    }
}

/// 判断 sqlx 错误是否属于瞬时类
///
/// 连接层故障（IO、TLS、池超时/关闭）与 PG 的死锁（40P01）、
/// 串行化失败（40001）可以通过重试恢复；约束冲突等逻辑错误不行。
pub fn is_transient_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

/// 判断 sqlx 错误是否为唯一约束冲突（PG 错误码 23505）
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

//! 仓储与外部客户端的接口定义
//!
//! 流水线、提现服务与 HTTP 处理器都依赖这些 trait 而非具体实现，
//! 单元测试用 mock 注入。

use async_trait::async_trait;

use loyalty_shared::error::Result;

use crate::clients::accrual::AccrualReply;
use crate::models::{Balance, Order, OrderStatus, PendingOrder, User, Withdrawal};

/// 订单上传的结果
///
/// 重复上传不是错误：同一用户重复提交是幂等操作，
/// 其他用户占用才作为错误（`OrderOwnedByOther`）返回。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSubmission {
    /// 新建成功
    Created,
    /// 该用户此前已上传过同一订单
    AlreadyYours,
}

/// 用户存储
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 创建用户，登录名冲突返回 `LoginTaken`
    async fn create(&self, login: &str, password_hash: &str) -> Result<User>;

    async fn by_login(&self, login: &str) -> Result<Option<User>>;

    async fn by_id(&self, id: i64) -> Result<Option<User>>;
}

/// 订单存储
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// 上传订单，订单号全局唯一且归首个上传者所有
    async fn create(&self, user_id: i64, number: i64) -> Result<OrderSubmission>;

    async fn by_number(&self, number: i64) -> Result<Option<Order>>;

    /// 按上传时间倒序
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>>;

    /// 所有未终态（NEW / PROCESSING）的订单，用于启动恢复
    async fn pending(&self) -> Result<Vec<PendingOrder>>;

    /// 非终态状态变更；对终态订单返回 `OrderAlreadyFinal`
    async fn update_status(&self, number: i64, status: OrderStatus) -> Result<()>;

    /// 订单入账：置为 PROCESSED 并给余额加上积分，单个事务内完成
    async fn commit_accrual(&self, number: i64, user_id: i64, accrual: i32) -> Result<()>;
}

/// 积分账本存储
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 查询余额，缺行返回 (0, 0)
    async fn balance(&self, user_id: i64) -> Result<Balance>;

    /// 提现：校验余额、写提现记录、更新余额，单个事务内完成。
    /// 余额不足返回 `InsufficientFunds`，订单号重复返回 `WithdrawalDuplicate`。
    async fn record_withdrawal(&self, user_id: i64, number: i64, sum: i32) -> Result<()>;

    /// 按处理时间倒序
    async fn withdrawals_by_user(&self, user_id: i64) -> Result<Vec<Withdrawal>>;
}

/// 积分计算系统客户端
#[async_trait]
pub trait AccrualApi: Send + Sync {
    /// 查询订单的积分计算结果
    async fn lookup(&self, number: i64) -> Result<AccrualReply>;
}

//! 领域模型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化。
//! 金额一律以「百分之一积分」的整数存储，浮点数只出现在序列化边界。

pub mod money;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 注册用户
///
/// 登录名区分大小写且全局唯一；密码哈希对核心逻辑不透明。
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    #[sqlx(rename = "name")]
    pub login: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
}

/// 订单状态
///
/// 状态只能单向推进：NEW -> PROCESSING -> {PROCESSED, INVALID}。
/// PROCESSED 与 INVALID 为终态，进入后不再变更。
/// 积分系统返回的 REGISTERED 只是外部标签，从不落库。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已上传，尚未进入计算
    New,
    /// 积分系统评估中
    Processing,
    /// 终态 - 被拒绝，无积分
    Invalid,
    /// 终态 - 已入账
    Processed,
}

impl OrderStatus {
    /// 是否为终态
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }
}

/// 消费订单
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    #[sqlx(rename = "id")]
    pub number: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    /// 积分金额（百分之一积分），仅 PROCESSED 订单持有
    pub accrual: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

/// 待处理订单的流水线引用
///
/// 只携带轮询所需的最小字段，入队/出队时按值复制。
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct PendingOrder {
    #[sqlx(rename = "id")]
    pub number: i64,
    pub user_id: i64,
    pub status: OrderStatus,
}

impl From<&Order> for PendingOrder {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number,
            user_id: order.user_id,
            status: order.status,
        }
    }
}

/// 用户积分余额
///
/// 数据库列 withdrawals 存放累计提现金额，与同名表是历史遗留的命名冲突，
/// 字段层面统一改叫 withdrawn。缺行等价于 (0, 0)。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct Balance {
    /// 可用余额（百分之一积分）
    pub current: i32,
    /// 累计提现（百分之一积分）
    #[sqlx(rename = "withdrawals")]
    pub withdrawn: i32,
}

/// 提现记录
///
/// order_id 指向用户将来用积分支付的订单号，不要求存在于 orders 表，
/// 但在所有提现记录中全局唯一。
#[derive(Debug, Clone, FromRow)]
pub struct Withdrawal {
    pub order_id: i64,
    pub user_id: i64,
    /// 提现金额（百分之一积分）
    pub sum: i32,
    pub processed_at: DateTime<Utc>,
}

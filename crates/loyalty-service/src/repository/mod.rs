//! 数据访问层
//!
//! 仓储按实体划分：用户、订单、积分账本。所有操作在仓储内部
//! 套用重试执行器处理瞬时故障，逻辑错误立即向上传播。

pub mod ledger_repo;
pub mod order_repo;
pub mod traits;
pub mod user_repo;

pub use ledger_repo::LedgerRepository;
pub use order_repo::OrderRepository;
pub use traits::{AccrualApi, LedgerStore, OrderStore, UserStore};
pub use user_repo::UserRepository;

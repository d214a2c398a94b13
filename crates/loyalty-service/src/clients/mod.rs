//! 外部服务客户端

pub mod accrual;

pub use accrual::{AccrualClient, AccrualReply};

//! 业务服务层

pub mod withdraw_service;

pub use withdraw_service::WithdrawService;

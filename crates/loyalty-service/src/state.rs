//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use crate::auth::JwtManager;
use crate::pipeline::PipelineHandle;
use crate::repository::traits::{LedgerStore, OrderStore, UserStore};
use crate::service::WithdrawService;

/// Axum 应用共享状态
///
/// 存储与客户端都以 trait 对象注入，handler 不感知具体实现。
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub withdraw_service: Arc<WithdrawService>,
    pub jwt: Arc<JwtManager>,
    pub pipeline: PipelineHandle,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn LedgerStore>,
        withdraw_service: Arc<WithdrawService>,
        jwt: Arc<JwtManager>,
        pipeline: PipelineHandle,
    ) -> Self {
        Self {
            users,
            orders,
            ledger,
            withdraw_service,
            jwt,
            pipeline,
        }
    }
}

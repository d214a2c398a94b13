//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射。
//! 认证由外层中间件统一处理，公开路由在中间件内豁免。

use axum::{
    Json, Router,
    routing::{get, post},
};

use crate::{handlers, state::AppState};

/// 构建 API 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // 认证
        .route("/api/user/register", post(handlers::auth::register))
        .route("/api/user/login", post(handlers::auth::login))
        .route("/api/user/refresh", post(handlers::auth::refresh))
        .route("/api/user/logout", post(handlers::auth::logout))
        // 订单
        .route(
            "/api/user/orders",
            post(handlers::orders::submit_order).get(handlers::orders::list_orders),
        )
        // 余额与提现
        .route("/api/user/balance", get(handlers::balance::get_balance))
        .route(
            "/api/user/balance/withdraw",
            post(handlers::balance::withdraw),
        )
        .route(
            "/api/user/withdrawals",
            get(handlers::balance::list_withdrawals),
        )
        // 探针
        .route("/health", get(health_check))
}

/// 存活探针：服务进程正常即返回 ok
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "loyalty-service"
    }))
}

//! 积分累积服务入口
//!
//! 启动顺序：配置 -> 日志 -> 数据库（含表结构）-> 流水线 -> HTTP 服务。
//! 关闭顺序相反：收到信号后先停止接收新连接，同时通知流水线退出，
//! 在途订单由下次启动恢复接手。

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use loyalty_service::auth::{JwtConfig, JwtManager};
use loyalty_service::clients::AccrualClient;
use loyalty_service::middleware::auth_middleware;
use loyalty_service::pipeline::{self, OrderPipeline};
use loyalty_service::repository::{
    LedgerRepository, OrderRepository, UserRepository,
    traits::{AccrualApi, LedgerStore, OrderStore, UserStore},
};
use loyalty_service::routes;
use loyalty_service::service::WithdrawService;
use loyalty_service::state::AppState;
use loyalty_shared::config::Config;
use loyalty_shared::database::Database;
use loyalty_shared::telemetry;

/// 优雅关闭的最长排空时间，超时后放弃剩余连接
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    telemetry::init(&config.log_level, &config.log_format)?;

    if config.uses_default_secret() {
        warn!("Using default secret key - set SECRET_KEY for production");
    }

    info!("Starting loyalty-service on {}", config.listen_addr());

    // 基础设施
    let db = Database::connect(&config.database_uri).await?;
    db.ensure_schema().await?;

    let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(db.pool().clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db.pool().clone()));
    let ledger: Arc<dyn LedgerStore> = Arc::new(LedgerRepository::new(db.pool().clone()));

    let accrual: Arc<dyn AccrualApi> = Arc::new(AccrualClient::new(config.accrual_base_url()));
    info!("Accrual system at {}", config.accrual_base_url());

    // 订单处理流水线 + 关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let order_pipeline = OrderPipeline::new(orders.clone(), accrual);
    let pipeline_handle = order_pipeline.handle();
    tokio::spawn(order_pipeline.run(shutdown_rx));

    // 启动恢复：崩溃或停机期间的在途订单回到流水线
    tokio::spawn(pipeline::recover_pending(
        orders.clone(),
        pipeline_handle.clone(),
    ));

    let jwt = Arc::new(JwtManager::new(JwtConfig {
        secret: config.secret_key.clone(),
        ..JwtConfig::default()
    }));
    let withdraw_service = Arc::new(WithdrawService::new(ledger.clone()));

    let state = AppState::new(
        users,
        orders,
        ledger,
        withdraw_service,
        jwt,
        pipeline_handle,
    );

    let app = routes::api_routes()
        // 认证中间件：验证 JWT Token 并注入当前用户
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!("Listening on {}", config.listen_addr());

    // 优雅关闭：收到 SIGTERM 或 Ctrl+C 后停止接收新连接，
    // 最多等待 5 秒让已有请求处理完毕，超时则放弃剩余连接
    let mut shutdown_observed = shutdown_tx.subscribe();
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));

    tokio::select! {
        result = server => result?,
        _ = async {
            // 先等关闭信号出现再起表：限制的是排空时长，不是服务寿命
            let _ = shutdown_observed.changed().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "优雅关闭超时，放弃剩余连接"
            );
        }
    }

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到任一信号后先通知流水线退出，再返回以触发 axum 的优雅关闭流程。
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }

    let _ = shutdown_tx.send(true);
}

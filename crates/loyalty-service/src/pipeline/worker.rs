//! 订单处理流水线 Worker
//!
//! 单个长驻任务从有界队列消费待处理订单，逐个向积分计算系统查询结果：
//! - 终态（PROCESSED / INVALID）落库后订单离开流水线
//! - 非终态（REGISTERED / PROCESSING）重新入队继续轮询
//! - 瞬时故障延迟重新入队
//!
//! 队列只是加速器，持久层才是事实来源：启动恢复会把所有未终态订单
//! 重新送入队列，因此掉队（队列满、进程重启）只影响收敛速度，
//! 不影响正确性。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use loyalty_shared::error::LoyaltyError;

use crate::clients::accrual::AccrualReply;
use crate::models::{OrderStatus, PendingOrder};
use crate::repository::traits::{AccrualApi, OrderStore};

/// 队列容量
///
/// 超出的订单由启动恢复兜底，容量只需覆盖常态的在途订单数。
pub const QUEUE_CAPACITY: usize = 10;

/// 瞬时故障后的重新入队延迟
const REQUEUE_DELAY: Duration = Duration::from_secs(10);

/// 非终态订单的轮询间隔
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 流水线入队句柄
///
/// 生产者侧（HTTP 处理器、启动恢复任务）持有，可自由克隆。
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<PendingOrder>,
}

impl PipelineHandle {
    /// 尽力入队，不阻塞调用方
    ///
    /// 队列满时只记日志：订单已落库，下次启动恢复会接手。
    pub fn try_enqueue(&self, order: PendingOrder) {
        if let Err(e) = self.tx.try_send(order) {
            warn!(
                order = order.number,
                error = %e,
                "订单未能入队，等待启动恢复接手"
            );
        }
    }

    /// 阻塞式入队，用于启动恢复等可以等待的场景
    pub async fn enqueue(&self, order: PendingOrder) -> bool {
        self.tx.send(order).await.is_ok()
    }
}

/// 启动恢复：把所有未终态订单重新送入队列
///
/// 崩溃或停机期间的在途订单从这里回到流水线。
pub async fn recover_pending(store: Arc<dyn OrderStore>, handle: PipelineHandle) {
    match store.pending().await {
        Ok(orders) => {
            let total = orders.len();
            for order in orders {
                if !handle.enqueue(order).await {
                    warn!("流水线已关闭，启动恢复中止");
                    return;
                }
            }
            info!(count = total, "未完成订单已重新入队");
        }
        Err(e) => {
            error!(error = %e, "读取未完成订单失败，启动恢复跳过");
        }
    }
}

/// 订单处理流水线
pub struct OrderPipeline {
    store: Arc<dyn OrderStore>,
    accrual: Arc<dyn AccrualApi>,
    tx: mpsc::Sender<PendingOrder>,
    rx: mpsc::Receiver<PendingOrder>,
    requeue_delay: Duration,
    poll_interval: Duration,
}

impl OrderPipeline {
    pub fn new(store: Arc<dyn OrderStore>, accrual: Arc<dyn AccrualApi>) -> Self {
        Self::with_timing(store, accrual, REQUEUE_DELAY, POLL_INTERVAL)
    }

    /// 自定义延迟参数的构造，测试用短间隔避免等待
    fn with_timing(
        store: Arc<dyn OrderStore>,
        accrual: Arc<dyn AccrualApi>,
        requeue_delay: Duration,
        poll_interval: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            store,
            accrual,
            tx,
            rx,
            requeue_delay,
            poll_interval,
        }
    }

    /// 获取入队句柄
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            tx: self.tx.clone(),
        }
    }

    /// 主循环：消费队列直到收到关闭信号
    ///
    /// 收到关闭信号时立即停止，在途订单被放弃，由下次启动恢复接手。
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("订单处理流水线已启动");

        loop {
            let order = tokio::select! {
                _ = shutdown.changed() => break,
                maybe = self.rx.recv() => match maybe {
                    Some(order) => order,
                    None => break,
                },
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = self.process(order) => {}
            }
        }

        info!("订单处理流水线已停止");
    }

    /// 处理单个订单
    ///
    /// 任何失败都不会让 worker 退出：要么延迟重新入队，要么记日志丢弃。
    async fn process(&self, mut order: PendingOrder) {
        let reply = match self.accrual.lookup(order.number).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    order = order.number,
                    error = %e,
                    "积分查询失败，稍后重新入队"
                );
                self.requeue_later(order, self.requeue_delay);
                return;
            }
        };

        match reply {
            AccrualReply::Invalid => {
                info!(order = order.number, "订单被积分系统判定为无效");
                match self.store.update_status(order.number, OrderStatus::Invalid).await {
                    Ok(()) | Err(LoyaltyError::OrderAlreadyFinal { .. }) => {}
                    Err(e) => {
                        warn!(order = order.number, error = %e, "状态落库失败，稍后重试");
                        self.requeue_later(order, self.requeue_delay);
                    }
                }
            }
            AccrualReply::Processed { accrual } => {
                match self
                    .store
                    .commit_accrual(order.number, order.user_id, accrual)
                    .await
                {
                    Ok(()) => {
                        info!(order = order.number, accrual, "积分已入账");
                    }
                    // 重复送达：该订单此前已入账，直接离开流水线
                    Err(LoyaltyError::OrderAlreadyFinal { .. }) => {}
                    Err(e) => {
                        warn!(order = order.number, error = %e, "积分入账失败，稍后重试");
                        self.requeue_later(order, self.requeue_delay);
                    }
                }
            }
            AccrualReply::Registered | AccrualReply::Processing => {
                // REGISTERED 只是外部标签，不落库；PROCESSING 在状态变化时落库
                if reply == AccrualReply::Processing && order.status != OrderStatus::Processing {
                    match self
                        .store
                        .update_status(order.number, OrderStatus::Processing)
                        .await
                    {
                        Ok(()) => order.status = OrderStatus::Processing,
                        Err(LoyaltyError::OrderAlreadyFinal { .. }) => return,
                        Err(e) => {
                            warn!(order = order.number, error = %e, "状态落库失败");
                        }
                    }
                }
                self.requeue_later(order, self.poll_interval);
            }
        }
    }

    /// 延迟重新入队
    ///
    /// 通过独立任务完成发送，worker 永远不会阻塞在自己消费的队列上。
    fn requeue_later(&self, order: PendingOrder, delay: Duration) {
        if delay.is_zero() {
            // 无延迟时先尝试直接入队，满了再走异步路径
            match self.tx.try_send(order) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Closed(_)) => return,
                Err(mpsc::error::TrySendError::Full(order)) => {
                    self.spawn_requeue(order, Duration::ZERO);
                }
            }
            return;
        }
        self.spawn_requeue(order, delay);
    }

    fn spawn_requeue(&self, order: PendingOrder, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = tx.send(order).await {
                warn!(
                    order = e.0.number,
                    "流水线已关闭，订单等待下次启动恢复"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use loyalty_shared::error::{LoyaltyError, Result};

    use crate::models::Order;
    use crate::repository::traits::OrderSubmission;

    /// 记录调用的 mock 订单存储
    #[derive(Default)]
    struct MockOrderStore {
        status_updates: Mutex<Vec<(i64, OrderStatus)>>,
        committed: Mutex<Vec<(i64, i64, i32)>>,
        pending_orders: Mutex<Vec<PendingOrder>>,
        /// 为 true 时 commit_accrual 返回瞬时失败
        fail_commit: bool,
        /// 为 true 时订单已处于终态
        already_final: bool,
    }

    #[async_trait]
    impl OrderStore for MockOrderStore {
        async fn create(&self, _user_id: i64, _number: i64) -> Result<OrderSubmission> {
            Ok(OrderSubmission::Created)
        }

        async fn by_number(&self, _number: i64) -> Result<Option<Order>> {
            Ok(None)
        }

        async fn list_by_user(&self, _user_id: i64) -> Result<Vec<Order>> {
            Ok(vec![])
        }

        async fn pending(&self) -> Result<Vec<PendingOrder>> {
            Ok(self.pending_orders.lock().unwrap().clone())
        }

        async fn update_status(&self, number: i64, status: OrderStatus) -> Result<()> {
            if self.already_final {
                return Err(LoyaltyError::OrderAlreadyFinal { number });
            }
            self.status_updates.lock().unwrap().push((number, status));
            Ok(())
        }

        async fn commit_accrual(&self, number: i64, user_id: i64, accrual: i32) -> Result<()> {
            if self.already_final {
                return Err(LoyaltyError::OrderAlreadyFinal { number });
            }
            if self.fail_commit {
                return Err(LoyaltyError::Database(sqlx::Error::PoolTimedOut));
            }
            self.committed.lock().unwrap().push((number, user_id, accrual));
            Ok(())
        }
    }

    /// 返回固定应答序列的 mock 积分客户端
    struct MockAccrual {
        replies: Mutex<Vec<Result<AccrualReply>>>,
    }

    impl MockAccrual {
        fn new(replies: Vec<Result<AccrualReply>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl AccrualApi for MockAccrual {
        async fn lookup(&self, _number: i64) -> Result<AccrualReply> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok(AccrualReply::Processing)
            } else {
                replies.remove(0)
            }
        }
    }

    fn order(number: i64, status: OrderStatus) -> PendingOrder {
        PendingOrder {
            number,
            user_id: 1,
            status,
        }
    }

    fn test_pipeline(
        store: Arc<MockOrderStore>,
        accrual: MockAccrual,
    ) -> OrderPipeline {
        OrderPipeline::with_timing(
            store,
            Arc::new(accrual),
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
    }

    /// PROCESSED 应答触发一次入账且不再入队
    #[tokio::test]
    async fn test_processed_commits_and_leaves_pipeline() {
        let store = Arc::new(MockOrderStore::default());
        let accrual = MockAccrual::new(vec![Ok(AccrualReply::Processed { accrual: 550 })]);
        let mut pipeline = test_pipeline(store.clone(), accrual);

        pipeline.process(order(12345678903, OrderStatus::New)).await;

        assert_eq!(
            store.committed.lock().unwrap().as_slice(),
            &[(12345678903, 1, 550)]
        );
        assert!(pipeline.rx.try_recv().is_err(), "终态订单不应重新入队");
    }

    /// INVALID 应答落库为终态且不再入队
    #[tokio::test]
    async fn test_invalid_marks_order_and_leaves_pipeline() {
        let store = Arc::new(MockOrderStore::default());
        let accrual = MockAccrual::new(vec![Ok(AccrualReply::Invalid)]);
        let mut pipeline = test_pipeline(store.clone(), accrual);

        pipeline.process(order(12345678903, OrderStatus::New)).await;

        assert_eq!(
            store.status_updates.lock().unwrap().as_slice(),
            &[(12345678903, OrderStatus::Invalid)]
        );
        assert!(store.committed.lock().unwrap().is_empty());
        assert!(pipeline.rx.try_recv().is_err());
    }

    /// PROCESSING 应答：状态落库一次，订单重新入队
    #[tokio::test]
    async fn test_processing_persists_status_and_requeues() {
        let store = Arc::new(MockOrderStore::default());
        let accrual = MockAccrual::new(vec![Ok(AccrualReply::Processing)]);
        let mut pipeline = test_pipeline(store.clone(), accrual);

        pipeline.process(order(12345678903, OrderStatus::New)).await;

        assert_eq!(
            store.status_updates.lock().unwrap().as_slice(),
            &[(12345678903, OrderStatus::Processing)]
        );

        // 重新入队带延迟，等它完成
        tokio::time::sleep(Duration::from_millis(50)).await;
        let requeued = pipeline.rx.try_recv().expect("订单应重新入队");
        assert_eq!(requeued.number, 12345678903);
        // 后续轮询携带已更新的状态，不会重复落库
        assert_eq!(requeued.status, OrderStatus::Processing);
    }

    /// REGISTERED 只是外部标签：不落库，但继续轮询
    #[tokio::test]
    async fn test_registered_never_persisted() {
        let store = Arc::new(MockOrderStore::default());
        let accrual = MockAccrual::new(vec![Ok(AccrualReply::Registered)]);
        let mut pipeline = test_pipeline(store.clone(), accrual);

        pipeline.process(order(12345678903, OrderStatus::New)).await;

        assert!(store.status_updates.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pipeline.rx.try_recv().is_ok(), "订单应继续轮询");
    }

    /// 瞬时查询失败：延迟重新入队
    #[tokio::test]
    async fn test_transient_lookup_failure_requeues() {
        let store = Arc::new(MockOrderStore::default());
        let accrual = MockAccrual::new(vec![Err(LoyaltyError::ExternalService {
            service: "accrual".to_string(),
            message: "503".to_string(),
        })]);
        let mut pipeline = test_pipeline(store.clone(), accrual);

        pipeline.process(order(12345678903, OrderStatus::New)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pipeline.rx.try_recv().is_ok(), "瞬时失败应重新入队");
        assert!(store.committed.lock().unwrap().is_empty());
    }

    /// 入账失败：订单重新入队等待重试
    #[tokio::test]
    async fn test_commit_failure_requeues() {
        let store = Arc::new(MockOrderStore {
            fail_commit: true,
            ..MockOrderStore::default()
        });
        let accrual = MockAccrual::new(vec![Ok(AccrualReply::Processed { accrual: 550 })]);
        let mut pipeline = test_pipeline(store.clone(), accrual);

        pipeline.process(order(12345678903, OrderStatus::New)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pipeline.rx.try_recv().is_ok(), "入账失败应重新入队");
    }

    /// 已入账的订单重复送达：直接离开流水线
    #[tokio::test]
    async fn test_already_final_order_dropped() {
        let store = Arc::new(MockOrderStore {
            already_final: true,
            ..MockOrderStore::default()
        });
        let accrual = MockAccrual::new(vec![Ok(AccrualReply::Processed { accrual: 550 })]);
        let mut pipeline = test_pipeline(store.clone(), accrual);

        pipeline.process(order(12345678903, OrderStatus::New)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pipeline.rx.try_recv().is_err(), "终态订单不应重新入队");
    }

    /// run 循环消费订单直到收到关闭信号
    #[tokio::test]
    async fn test_run_consumes_until_shutdown() {
        let store = Arc::new(MockOrderStore::default());
        let accrual = MockAccrual::new(vec![Ok(AccrualReply::Processed { accrual: 100 })]);
        let pipeline = test_pipeline(store.clone(), accrual);
        let handle = pipeline.handle();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(pipeline.run(shutdown_rx));

        assert!(handle.enqueue(order(12345678903, OrderStatus::New)).await);

        // 轮询等待入账完成
        for _ in 0..100 {
            if !store.committed.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            store.committed.lock().unwrap().as_slice(),
            &[(12345678903, 1, 100)]
        );

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker 应在关闭信号后退出")
            .unwrap();
    }

    /// 启动恢复把未终态订单全部入队
    #[tokio::test]
    async fn test_recover_pending_enqueues_all() {
        let store = Arc::new(MockOrderStore::default());
        store.pending_orders.lock().unwrap().extend([
            order(12345678903, OrderStatus::New),
            order(79927398713, OrderStatus::Processing),
        ]);
        let accrual = MockAccrual::new(vec![]);
        let mut pipeline = test_pipeline(store.clone(), accrual);
        let handle = pipeline.handle();

        recover_pending(store.clone(), handle).await;

        let first = pipeline.rx.try_recv().unwrap();
        let second = pipeline.rx.try_recv().unwrap();
        assert_eq!(first.number, 12345678903);
        assert_eq!(second.number, 79927398713);
        assert!(pipeline.rx.try_recv().is_err());
    }

    /// 队列满时 try_enqueue 不阻塞、不报错
    #[tokio::test]
    async fn test_try_enqueue_on_full_queue_does_not_block() {
        let store = Arc::new(MockOrderStore::default());
        let accrual = MockAccrual::new(vec![]);
        let pipeline = test_pipeline(store, accrual);
        let handle = pipeline.handle();

        // 填满队列再多塞一个
        for i in 0..(QUEUE_CAPACITY as i64 + 1) {
            handle.try_enqueue(order(i, OrderStatus::New));
        }
        // 没有 panic、没有阻塞即为通过
    }
}

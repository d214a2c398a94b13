//! 积分提现服务
//!
//! 校验提现请求并调用账本存储完成扣减。正确性由数据库事务保证；
//! 这里额外持有进程内的按用户互斥锁，只为减少同一用户快速连续提现时
//! 在行锁上的碰撞。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use loyalty_shared::error::{LoyaltyError, Result};

use crate::luhn;
use crate::models::money;
use crate::repository::traits::LedgerStore;

/// 积分提现服务
pub struct WithdrawService {
    ledger: Arc<dyn LedgerStore>,
    /// 按用户的进程内互斥锁
    user_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl WithdrawService {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger,
            user_locks: DashMap::new(),
        }
    }

    /// 取出该用户的互斥锁，首次访问时创建
    fn lock_for(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 提现
    ///
    /// 订单号必须是通过 Luhn 校验的数字串（指向将来用积分支付的订单，
    /// 不要求已存在）；金额必须为正。
    pub async fn withdraw(&self, user_id: i64, order: &str, sum: f64) -> Result<()> {
        let number = luhn::parse_order_number(order)?;

        let hundredths = money::sum_to_hundredths(sum);
        if hundredths <= 0 {
            return Err(LoyaltyError::Validation(
                "提现金额必须为正".to_string(),
            ));
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        self.ledger.record_withdrawal(user_id, number, hundredths).await
    }
}

//! 积分计算系统客户端
//!
//! 查询 `GET {base}/api/orders/{number}`。外部系统不可靠：
//! 会返回 204（订单尚未注册）、429（限流）与各类 5xx，
//! 这些都归为瞬时错误，由重试执行器与流水线的重新入队兜底。
//!
//! 限流闸门是进程级共享状态：收到 429 后把「下一次允许请求的时间」
//! 推到 now + 退避时长，所有并发调用方在发请求前都要等过这个时间点。
//! 闸门只延迟请求，从不拒绝。

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use loyalty_shared::error::{LoyaltyError, Result};
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};

use crate::models::money;
use crate::repository::traits::AccrualApi;

/// 429 未携带 Retry-After 时的默认退避
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(30);

/// 出站请求超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 积分计算结果
///
/// REGISTERED 与 PROCESSING 表示还要继续轮询；
/// INVALID 与 PROCESSED 是终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualReply {
    /// 外部系统已登记订单，尚无结果
    Registered,
    /// 计算中
    Processing,
    /// 终态 - 拒绝，无积分
    Invalid,
    /// 终态 - 通过，携带积分金额（百分之一积分）
    Processed { accrual: i32 },
}

/// 积分系统的应答体
#[derive(Debug, Deserialize)]
struct AccrualBody {
    #[allow(dead_code)]
    order: String,
    status: String,
    accrual: Option<f64>,
}

/// 积分计算系统 HTTP 客户端
pub struct AccrualClient {
    http: reqwest::Client,
    base_url: String,
    /// 限流闸门：下一次允许发起请求的 Unix 纳秒时间戳
    not_before_nanos: AtomicI64,
    policy: RetryPolicy,
}

impl AccrualClient {
    /// 创建客户端
    ///
    /// base_url 需携带协议前缀（由配置层补全）。
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client 构建失败");

        Self {
            http,
            base_url,
            not_before_nanos: AtomicI64::new(0),
            policy: RetryPolicy::default(),
        }
    }

    fn now_nanos() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }

    /// 距离闸门开启还需等待的时长
    fn gate_delay(&self) -> Duration {
        let not_before = self.not_before_nanos.load(Ordering::Acquire);
        let now = Self::now_nanos();
        if not_before > now {
            Duration::from_nanos((not_before - now) as u64)
        } else {
            Duration::ZERO
        }
    }

    /// 把闸门推到 now + backoff
    ///
    /// fetch_max 保证并发的 429 应答只会把闸门越推越远，不会回退。
    fn push_not_before(&self, backoff: Duration) {
        let target = Self::now_nanos().saturating_add(backoff.as_nanos() as i64);
        self.not_before_nanos.fetch_max(target, Ordering::AcqRel);
    }

    /// 等待闸门开启
    ///
    /// 睡醒后重新检查：等待期间别的调用可能又收到 429 把闸门推远了。
    async fn wait_for_gate(&self) {
        loop {
            let delay = self.gate_delay();
            if delay.is_zero() {
                return;
            }
            debug!(delay_ms = delay.as_millis() as u64, "等待限流闸门开启");
            tokio::time::sleep(delay).await;
        }
    }

    /// 解析 Retry-After 头（秒），缺失或不可解析时用默认退避
    fn retry_after_backoff(header: Option<&str>) -> Duration {
        header
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF)
    }

    fn transient(message: String) -> LoyaltyError {
        LoyaltyError::ExternalService {
            service: "accrual".to_string(),
            message,
        }
    }

    /// 把应答体映射为查询结果
    fn reply_from_body(body: AccrualBody) -> Result<AccrualReply> {
        match body.status.as_str() {
            "REGISTERED" => Ok(AccrualReply::Registered),
            "PROCESSING" => Ok(AccrualReply::Processing),
            "INVALID" => Ok(AccrualReply::Invalid),
            "PROCESSED" => {
                let accrual = money::accrual_to_hundredths(body.accrual.unwrap_or(0.0));
                Ok(AccrualReply::Processed { accrual })
            }
            other => Err(Self::transient(format!("未知的订单状态: {other}"))),
        }
    }

    /// 单次查询
    async fn attempt(&self, number: i64) -> Result<AccrualReply> {
        self.wait_for_gate().await;

        let url = format!("{}/api/orders/{}", self.base_url, number);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::transient(format!("请求失败: {e}")))?;

        let status = response.status();

        if status == reqwest::StatusCode::NO_CONTENT {
            // 订单尚未被积分系统接收，稍后再查
            return Err(Self::transient(format!("订单 {number} 尚未登记")));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let backoff = Self::retry_after_backoff(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            self.push_not_before(backoff);
            warn!(
                backoff_secs = backoff.as_secs(),
                "积分系统限流，推迟后续请求"
            );
            return Err(Self::transient("积分系统限流".to_string()));
        }

        if !status.is_success() {
            return Err(Self::transient(format!("应答状态码 {status}")));
        }

        let body: AccrualBody = response
            .json()
            .await
            .map_err(|e| Self::transient(format!("应答解析失败: {e}")))?;

        Self::reply_from_body(body)
    }
}

#[async_trait]
impl AccrualApi for AccrualClient {
    async fn lookup(&self, number: i64) -> Result<AccrualReply> {
        retry_with_policy(
            &self.policy,
            "accrual.lookup",
            |e| e.is_retryable(),
            || self.attempt(number),
        )
        .await
    }
}

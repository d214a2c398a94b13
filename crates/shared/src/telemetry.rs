//! 日志初始化模块
//!
//! 基于 tracing-subscriber 提供结构化日志。支持 pretty（人类可读）
//! 与 json（日志采集）两种输出格式，级别由 RUST_LOG 或配置项控制。

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// 初始化全局日志订阅器
///
/// RUST_LOG 优先于配置中的 log_level，方便临时调试时不改配置。
pub fn init(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if log_format == "json" {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_failure() {
        // 全局订阅器只能注册一次，第二次调用应返回错误而非 panic
        let first = init("info", "pretty");
        let second = init("debug", "json");
        assert!(first.is_ok() || second.is_err());
    }
}

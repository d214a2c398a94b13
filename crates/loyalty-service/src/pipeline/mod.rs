//! 订单处理流水线
//!
//! 消费待处理订单队列，轮询积分计算系统并把结果落库。

pub mod worker;

pub use worker::{OrderPipeline, PipelineHandle, recover_pending};

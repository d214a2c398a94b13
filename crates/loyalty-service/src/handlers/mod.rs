//! HTTP 处理器
//!
//! 处理器只做三件事：解析请求、调用核心操作、把结果映射为响应。
//! 金额与订单号的字符串形式只存在于这一层。

pub mod auth;
pub mod balance;
pub mod orders;

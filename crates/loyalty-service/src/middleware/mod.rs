//! HTTP 中间件

pub mod auth;

pub use auth::{AuthUser, auth_middleware};

//! 认证相关的 HTTP 处理器
//!
//! 提供注册、登录、登出和刷新 Token 的 API。
//! 注册成功即自动登录：Token 同时通过响应体和 Cookie 下发。

use axum::{
    Json,
    extract::{Request, State},
    http::header,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::auth::{JwtManager, TokenPair, hash_password, verify_password};
use crate::error::{ApiError, Result};
use crate::middleware::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, extract_token};
use crate::repository::traits::UserStore;
use crate::state::AppState;

// ============================================
// 请求/响应 DTO
// ============================================

/// 注册请求
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "登录名长度必须在 3-50 之间"))]
    pub login: String,
    #[validate(length(min = 6, max = 100, message = "密码长度必须在 6-100 之间"))]
    pub password: String,
}

/// 登录请求
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "登录名不能为空"))]
    pub login: String,
    #[validate(length(min = 1, message = "密码不能为空"))]
    pub password: String,
}

/// Token 响应
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// 访问 Token 的过期时间戳（Unix 秒）
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            expires_in: pair.expires_at,
        }
    }
}

// ============================================
// Cookie 构造
// ============================================

fn cookie(name: &str, value: &str, max_age_secs: i64) -> (header::HeaderName, String) {
    (
        header::SET_COOKIE,
        format!("{name}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Strict"),
    )
}

/// 下发 Token 对的两个 Cookie
fn auth_cookies(jwt: &JwtManager, pair: &TokenPair) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        cookie(ACCESS_TOKEN_COOKIE, &pair.access_token, jwt.access_ttl_secs()),
        cookie(REFRESH_TOKEN_COOKIE, &pair.refresh_token, jwt.refresh_ttl_secs()),
    ])
}

/// 清除两个 Cookie（Max-Age=0 即删除）
fn cleared_cookies() -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        cookie(ACCESS_TOKEN_COOKIE, "", 0),
        cookie(REFRESH_TOKEN_COOKIE, "", 0),
    ])
}

// ============================================
// API 处理器
// ============================================

/// 用户注册
///
/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response> {
    req.validate()?;

    let password_hash = hash_password(&req.password)?;
    let user = state.users.create(&req.login, &password_hash).await?;

    tracing::info!(user_id = user.id, login = %user.login, "新用户注册");

    // 注册即登录
    let pair = state.jwt.generate_pair(user.id, &user.login)?;

    Ok((
        auth_cookies(&state.jwt, &pair),
        Json(TokenResponse::from(pair)),
    )
        .into_response())
}

/// 用户登录
///
/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response> {
    req.validate()?;

    let user = state
        .users
        .by_login(&req.login)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(login = %req.login, "登录失败");
        return Err(ApiError::InvalidCredentials);
    }

    let pair = state.jwt.generate_pair(user.id, &user.login)?;

    Ok((
        auth_cookies(&state.jwt, &pair),
        Json(TokenResponse::from(pair)),
    )
        .into_response())
}

/// 用户登出
///
/// POST /api/user/logout
///
/// 清除两个 Token Cookie。
pub async fn logout() -> Response {
    (
        cleared_cookies(),
        Json(json!({ "message": "已登出" })),
    )
        .into_response()
}

/// 刷新 Token
///
/// POST /api/user/refresh
///
/// 从 `refresh_token` Cookie 或 Authorization 头取刷新 Token，
/// 换发新的 Token 对。
pub async fn refresh(State(state): State<AppState>, request: Request) -> Result<Response> {
    let token = extract_token(&request, REFRESH_TOKEN_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("缺少刷新 Token".to_string()))?;

    let claims = state.jwt.verify_token(&token)?;
    let user_id = claims.user_id()?;

    // 确认用户仍然存在
    let user = state
        .users
        .by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("用户不存在".to_string()))?;

    let pair = state.jwt.generate_pair(user.id, &user.login)?;

    Ok((
        auth_cookies(&state.jwt, &pair),
        Json(TokenResponse::from(pair)),
    )
        .into_response())
}

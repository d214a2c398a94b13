//! JWT 认证中间件
//!
//! 从 `access_token` Cookie 或 `Authorization: Bearer` 头提取 Token，
//! 验证后加载用户并注入请求扩展。对公开路由跳过验证。

use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::repository::traits::UserStore;
use crate::state::AppState;

/// 访问 Token 的 Cookie 名
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// 刷新 Token 的 Cookie 名
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// 已认证的当前用户
///
/// 由认证中间件注入请求扩展，处理器通过 `Extension<AuthUser>` 获取。
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub login: String,
}

/// 认证中间件
///
/// Cookie 优先于 Authorization 头（与登录时的下发方式一致）。
/// Token 验证通过后还会确认用户仍然存在，防止凭陈旧 Token 操作。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();

    // 公开路由列表（不需要认证）
    let public_paths = [
        "/api/user/register",
        "/api/user/login",
        "/api/user/refresh",
        "/health",
    ];

    if public_paths.iter().any(|p| path.starts_with(p)) {
        return next.run(request).await;
    }

    let Some(token) = extract_token(&request, ACCESS_TOKEN_COOKIE) else {
        return unauthorized_response("缺少认证 Token");
    };

    let claims = match state.jwt.verify_token(&token) {
        Ok(claims) => claims,
        Err(e) => return unauthorized_response(&e.to_string()),
    };

    let user_id = match claims.user_id() {
        Ok(id) => id,
        Err(_) => return unauthorized_response("无效的 Token"),
    };

    match state.users.by_id(user_id).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser {
                id: user.id,
                login: user.login,
            });
            next.run(request).await
        }
        Ok(None) => unauthorized_response("用户不存在"),
        Err(e) => {
            tracing::error!(error = %e, "认证时加载用户失败");
            unauthorized_response("认证失败")
        }
    }
}

/// 提取 Token：先看 Cookie，再看 Authorization 头
pub fn extract_token(request: &Request, cookie_name: &str) -> Option<String> {
    if let Some(token) = cookie_value(request, cookie_name) {
        return Some(token);
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// 从 Cookie 头解析指定名称的值
fn cookie_value(request: &Request, name: &str) -> Option<String> {
    let cookies = request.headers().get(header::COOKIE)?.to_str().ok()?;

    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(name) {
            let value = parts.next().unwrap_or("");
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// 生成 401 未授权响应
fn unauthorized_response(message: &str) -> Response {
    let body = json!({
        "code": "UNAUTHORIZED",
        "message": message,
    });

    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/user/orders");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_token_from_cookie() {
        let request = request_with_headers(&[("cookie", "access_token=abc123; other=x")]);
        assert_eq!(
            extract_token(&request, ACCESS_TOKEN_COOKIE),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_token_from_bearer_header() {
        let request = request_with_headers(&[("authorization", "Bearer xyz789")]);
        assert_eq!(
            extract_token(&request, ACCESS_TOKEN_COOKIE),
            Some("xyz789".to_string())
        );
    }

    #[test]
    fn test_cookie_takes_precedence_over_header() {
        let request = request_with_headers(&[
            ("cookie", "access_token=from-cookie"),
            ("authorization", "Bearer from-header"),
        ]);
        assert_eq!(
            extract_token(&request, ACCESS_TOKEN_COOKIE),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn test_missing_token() {
        let request = request_with_headers(&[]);
        assert_eq!(extract_token(&request, ACCESS_TOKEN_COOKIE), None);

        // 非 Bearer 格式的 Authorization 头不算
        let request = request_with_headers(&[("authorization", "Basic abc")]);
        assert_eq!(extract_token(&request, ACCESS_TOKEN_COOKIE), None);

        // 空值 Cookie 不算
        let request = request_with_headers(&[("cookie", "access_token=")]);
        assert_eq!(extract_token(&request, ACCESS_TOKEN_COOKIE), None);
    }

    #[test]
    fn test_refresh_cookie_lookup() {
        let request =
            request_with_headers(&[("cookie", "access_token=a; refresh_token=r-token")]);
        assert_eq!(
            extract_token(&request, REFRESH_TOKEN_COOKIE),
            Some("r-token".to_string())
        );
    }
}

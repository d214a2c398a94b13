//! JWT Token 处理
//!
//! 提供访问/刷新两级 Token 的生成和验证功能

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JWT 配置
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// 签名密钥
    pub secret: String,
    /// 访问 Token 过期时间（秒）
    pub access_ttl_secs: i64,
    /// 刷新 Token 过期时间（秒）
    pub refresh_ttl_secs: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "loyalty-secret-key-change-in-production".to_string(),
            access_ttl_secs: 15 * 60,           // 15 分钟
            refresh_ttl_secs: 7 * 24 * 60 * 60, // 7 天
        }
    }
}

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 用户 ID
    pub sub: String,
    /// 登录名
    pub login: String,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
}

impl Claims {
    /// 解析载荷中的用户 ID
    pub fn user_id(&self) -> Result<i64, ApiError> {
        self.sub
            .parse()
            .map_err(|_| ApiError::Internal("无效的用户 ID".to_string()))
    }
}

/// 签发的 Token 对
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// 访问 Token 的过期时间戳（Unix 秒）
    pub expires_at: i64,
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    /// 创建 JWT 管理器
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成访问 + 刷新 Token 对
    ///
    /// 两个 Token 载荷相同，仅过期时间不同。
    pub fn generate_pair(&self, user_id: i64, login: &str) -> Result<TokenPair, ApiError> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.config.access_ttl_secs);
        let refresh_exp = now + Duration::seconds(self.config.refresh_ttl_secs);

        let access_token = self.sign(user_id, login, now.timestamp(), access_exp.timestamp())?;
        let refresh_token = self.sign(user_id, login, now.timestamp(), refresh_exp.timestamp())?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: access_exp.timestamp(),
        })
    }

    fn sign(&self, user_id: i64, login: &str, iat: i64, exp: i64) -> Result<String, ApiError> {
        let claims = Claims {
            sub: user_id.to_string(),
            login: login.to_string(),
            iat,
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("JWT 生成失败: {e}")))
    }

    /// 验证并解析 JWT Token
    ///
    /// 返回解析后的 Claims，如果 Token 无效或过期则返回错误
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::default();

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token 已过期".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    ApiError::Unauthorized("无效的 Token".to_string())
                }
                _ => ApiError::Unauthorized(format!("Token 验证失败: {e}")),
            })?;

        Ok(token_data.claims)
    }

    /// 访问 Token 有效期（秒）
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl_secs
    }

    /// 刷新 Token 有效期（秒）
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.config.refresh_ttl_secs
    }
}

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use helpdesk_core::models::{Principal, Role};

use crate::error::ApiError;
use crate::routes::AppState;

pub const BEARER_PREFIX: &str = "Bearer ";

/// JWT 载荷，租户与角色由签发方写入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant_id: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("缺少认证令牌")]
    MissingToken,
    #[error("认证头格式错误")]
    MalformedHeader,
    #[error("认证令牌无效")]
    InvalidToken,
    #[error("认证令牌已过期")]
    ExpiredToken,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_hours: i64,
}

impl JwtService {
    pub fn new(secret: &str, expiration_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            expiration_hours,
        }
    }

    pub fn generate_token(&self, principal: &Principal) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.expiration_hours);

        let claims = Claims {
            sub: principal.user_id.clone(),
            tenant_id: principal.tenant_id.clone(),
            role: principal.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    header
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MalformedHeader)
}

/// 当前请求的调用方
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt.validate_token(token).inspect_err(|e| {
            warn!("认证失败: {} {}: {}", parts.method, parts.uri, e);
        })?;

        Ok(CurrentUser(Principal::new(claims.sub, claims.tenant_id, claims.role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip_keeps_tenant_and_role() {
        let jwt = JwtService::new("0123456789abcdef0123456789abcdef", 1);
        let principal = Principal::new("agent-7", "t1", Role::Agent);

        let token = jwt.generate_token(&principal).unwrap();
        let claims = jwt.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "agent-7");
        assert_eq!(claims.tenant_id, "t1");
        assert_eq!(claims.role, Role::Agent);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = JwtService::new("0123456789abcdef0123456789abcdef", 1);
        let verifier = JwtService::new("fedcba9876543210fedcba9876543210", 1);
        let token = issuer
            .generate_token(&Principal::new("u", "t1", Role::Admin))
            .unwrap();

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        let jwt = JwtService::new("0123456789abcdef0123456789abcdef", -2);
        let token = jwt
            .generate_token(&Principal::new("u", "t1", Role::Customer))
            .unwrap();

        assert!(matches!(jwt.validate_token(&token), Err(AuthError::ExpiredToken)));
    }
}

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::User;

/// 默认令牌有效期（24 小时）
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

const BEARER_PREFIX: &str = "Bearer ";

/// JWT claims used for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub name: String,
    pub iss: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
}

/// Stateless token service backed by HMAC (HS256)
pub struct TokenService {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    /// Creates a new token service
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>, ttl_seconds: u64) -> Self {
        let secret = secret.as_ref();
        Self {
            issuer: issuer.into(),
            ttl: Duration::from_secs(ttl_seconds.max(60)),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issues a token for the given user
    pub fn generate_token(&self, user: &User) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| anyhow!("system time error: {err}"))?;
        let iat = now.as_secs() as usize;
        let exp = (now + self.ttl).as_secs() as usize;

        let claims = TokenClaims {
            sub: user.id.clone(),
            name: user.name.clone(),
            iss: self.issuer.clone(),
            exp,
            iat,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| anyhow!("failed to encode token: {err}"))
    }

    /// Validates the token and returns the decoded claims
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| anyhow!("invalid token: {err}"))
    }

    /// 校验 `Authorization` 头，支持带或不带 `Bearer ` 前缀
    pub fn validate_header(&self, header: Option<&str>) -> Result<TokenClaims> {
        let header = header.map(str::trim).unwrap_or_default();
        if header.is_empty() {
            return Err(anyhow!("token is empty"));
        }
        let token = header.strip_prefix(BEARER_PREFIX).unwrap_or(header).trim();
        if token.is_empty() {
            return Err(anyhow!("token is empty"));
        }
        self.validate_token(token)
    }

    /// Returns token TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

impl TokenClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.iat as i64, 0).unwrap_or_else(Utc::now)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp as i64, 0).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", "usersvc", DEFAULT_TOKEN_TTL_SECS)
    }

    #[test]
    fn test_generate_and_validate() {
        let tokens = service();
        let user = User::new("42", "alice", "alice@example.com", "secret");
        let token = tokens.generate_token(&user).unwrap();

        let claims = tokens.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.iss, "usersvc");
        let lifetime = claims.expires_at() - claims.issued_at();
        assert_eq!(lifetime.num_hours(), 24);
    }

    #[test]
    fn test_validate_header() {
        let tokens = service();
        let token = tokens.generate_token(&User::new("1", "bob", "", "")).unwrap();

        assert!(tokens.validate_header(Some(&format!("Bearer {}", token))).is_ok());
        assert!(tokens.validate_header(Some(&token)).is_ok());

        let err = tokens.validate_header(None).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(tokens.validate_header(Some("Bearer ")).is_err());
        assert!(tokens.validate_header(Some("Bearer garbage")).is_err());
    }

    #[test]
    fn test_rejects_foreign_secret() {
        let other = TokenService::new("other-secret", "usersvc", DEFAULT_TOKEN_TTL_SECS);
        let token = other.generate_token(&User::new("1", "bob", "", "")).unwrap();
        assert!(service().validate_token(&token).is_err());
    }
}

use std::str::FromStr;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use market_core::{model::UserId, time::Clock};

use crate::context::ApiState;
use crate::error::ApiError;

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 access tokens.
///
/// Expiry is checked against the service clock rather than wall time so
/// tests can pin it.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    clock: Clock,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, ttl: Duration, clock: Clock) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            clock,
        }
    }

    /// # Errors
    ///
    /// Returns `ApiError::Internal` if signing fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, ApiError> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for malformed, forged or expired
    /// tokens.
    pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?
            .claims;
        if claims.exp <= self.clock.now().timestamp() {
            return Err(ApiError::Unauthorized("Token expired".into()));
        }
        UserId::from_str(&claims.sub).map_err(|_| ApiError::Unauthorized("Invalid token".into()))
    }
}

/// The `Authorization` header value with an optional `Bearer ` prefix removed.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim_start();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then_some(token)
}

//
// ─── EXTRACTORS ────────────────────────────────────────────────────────────────
//

/// A request that must carry a valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;
        state.tokens.verify(token).map(AuthUser)
    }
}

/// A request that may carry a token. Missing or invalid tokens read as
/// anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeAuthUser(pub Option<UserId>);

impl FromRequestParts<ApiState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let user = bearer_token(&parts.headers).and_then(|token| state.tokens.verify(token).ok());
        Ok(MaybeAuthUser(user))
    }
}

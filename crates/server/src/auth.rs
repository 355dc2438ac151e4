//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the client's login and role. Every protected
//! request re-reads the client by login, so deleted clients lose access at
//! once and role changes apply without a new token.

use std::time::Duration;

use app_config::AppConfig;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use model::Role;
use repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use service::{ClientsService, ServiceError};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Failed to issue token: {0}")]
    Issue(String),
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Client login.
    pub sub: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

/// Signs and validates bearer tokens.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: &str, audience: &str, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            lifetime,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            &cfg.jwt_key,
            &cfg.jwt_issuer,
            &cfg.jwt_audience,
            cfg.token_lifetime,
        )
    }

    /// Issues a token for `login` that expires after the configured lifetime.
    pub fn issue(&self, login: &str, role: Role) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: login.to_string(),
            role,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat.saturating_add(lifetime),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub client_id: i32,
    pub login: String,
    pub role: Role,
}

impl AuthUser {
    /// # Errors
    /// [`ApiError::Forbidden`] unless the caller has one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }
}

/// Request scope of a protected endpoint: the caller plus the unit of work
/// used both to authenticate and to serve the request.
pub struct Authorized {
    pub user: AuthUser,
    pub uow: Box<dyn UnitOfWork>,
}

impl FromRequestParts<AppState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        let token = extract_bearer_token(header).ok_or(AuthError::MissingToken)?;
        let claims = state.jwt.validate_token(token)?;

        let uow = state.begin().await?;
        let client = match ClientsService::new(uow.as_ref()).get_by_login(&claims.sub).await {
            Ok(client) => client,
            Err(ServiceError::NotFound(_)) => {
                return Err(ApiError::Unauthorized(format!(
                    "client '{}' no longer exists",
                    claims.sub
                )));
            }
            Err(err) => return Err(err.into()),
        };
        debug!(login = %client.login, role = %client.role, "request authorized");

        Ok(Self {
            user: AuthUser {
                client_id: client.id,
                login: client.login,
                role: client.role,
            },
            uow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret", "store", "clients", Duration::from_secs(3600))
    }

    #[test]
    fn test_jwt_roundtrip() {
        let jwt = manager();
        let token = jwt.issue("alice", Role::Customer).unwrap();
        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iss, "store");
        assert_eq!(claims.aud, "clients");
    }

    #[test]
    fn test_foreign_tokens_are_rejected() {
        let token = manager().issue("alice", Role::Customer).unwrap();

        let other_key = JwtManager::new("other", "store", "clients", Duration::from_secs(3600));
        assert!(other_key.validate_token(&token).is_err());

        let other_audience =
            JwtManager::new("test-secret", "store", "admins", Duration::from_secs(3600));
        assert!(other_audience.validate_token(&token).is_err());

        assert!(manager().validate_token("not-a-token").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = JwtManager::new("test-secret", "store", "clients", Duration::ZERO);
        let token = jwt.issue("alice", Role::Customer).unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(matches!(
            jwt.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_require_any() {
        let user = AuthUser {
            client_id: 1,
            login: "m".to_string(),
            role: Role::Manager,
        };
        assert!(user.require_any(&[Role::Administrator, Role::Manager]).is_ok());
        assert!(matches!(
            user.require_any(&[Role::Administrator]),
            Err(ApiError::Forbidden(_))
        ));
    }
}

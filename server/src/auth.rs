use std::{sync::Arc, time::Duration};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, server_state::ServerState};

pub const MIN_PASSWORD_LENGTH: usize = 8;
// bcrypt ignores everything past this many bytes.
const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing and verification of session tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, AppError> {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    fn issue_at(&self, user_id: i64, issued_at: i64) -> Result<String, AppError> {
        let claims = Claims {
            id: user_id,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl.as_secs() as i64),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(format!("Failed to sign token: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!("Rejected token: {err}");
                AppError::InvalidToken
            })
    }
}

pub fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!("Password must be at least {MIN_PASSWORD_LENGTH} characters")));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::BadRequest(format!("Password must be at most {MAX_PASSWORD_BYTES} bytes")));
    }
    Ok(())
}

/// A loose shape check: something before and after a single `@`, and a dotted domain.
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain.split('.').count() > 1
        && domain.split('.').all(|label| !label.is_empty())
}

/// Hashes on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| AppError::Internal(format!("Hashing task failed: {err}")))?
        .map_err(|err| AppError::Internal(format!("Failed to hash password: {err}")))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| AppError::Internal(format!("Hashing task failed: {err}")))?
        .map_err(|err| AppError::Internal(format!("Failed to verify password: {err}")))
}

/// The caller, identified by the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}

impl AuthUser {
    pub fn require_self(&self, user_id: i64) -> Result<(), AppError> {
        if self.id != user_id {
            return Err(AppError::Forbidden("You can only act on your own account"));
        }
        Ok(())
    }
}

impl FromRequestParts<Arc<ServerState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ServerState>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized)?;

        let claims = state.tokens.verify(bearer.token())?;

        Ok(AuthUser { id: claims.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let keys = TokenKeys::new("secret", Duration::from_secs(3600));
        let token = keys.issue(42).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let keys = TokenKeys::new("secret", Duration::from_secs(3600));
        let other = TokenKeys::new("another secret", Duration::from_secs(3600));

        let forged = other.issue(42).unwrap();
        assert!(matches!(keys.verify(&forged), Err(AppError::InvalidToken)));

        let two_hours_ago = Utc::now().timestamp() - 7200;
        let expired = keys.issue_at(42, two_hours_ago).unwrap();
        assert!(matches!(keys.verify(&expired), Err(AppError::InvalidToken)));

        assert!(matches!(keys.verify("not.a.token"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn password_length_bounds() {
        assert!(check_password("short").is_err());
        assert!(check_password("long enough").is_ok());
        assert!(check_password(&"x".repeat(MAX_PASSWORD_BYTES + 1)).is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("camille@example.com"));
        assert!(looks_like_email("c.martin@mail.example.fr"));
        assert!(!looks_like_email("camille"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("camille@localhost"));
        assert!(!looks_like_email("camille@example."));
        assert!(!looks_like_email("ca mille@example.com"));
        assert!(!looks_like_email("a@b@example.com"));
    }

    #[tokio::test]
    async fn hashes_verify_only_the_hashed_password() {
        let hash = hash_password("correct horse".into(), 4).await.unwrap();

        assert!(verify_password("correct horse".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("battery staple".into(), hash).await.unwrap());
    }
}

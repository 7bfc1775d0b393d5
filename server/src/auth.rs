//! Password hashing and bearer tokens
//!
//! Hashing runs on the blocking pool since bcrypt is deliberately slow.

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")?;
    Ok(hash)
}

/// A malformed stored hash counts as a mismatch
pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .context("Password verification task failed")?;
    Ok(matches)
}

/// Sign an HS256 token for `user`; returns the token and its expiry
pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> AppResult<(String, DateTime<Utc>)> {
    let issued_at = Utc::now();
    let expires_at = TimeDelta::try_hours(ttl_hours)
        .and_then(|ttl| issued_at.checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("token lifetime of {} hours is out of range", ttl_hours))?;
    let claims = Claims {
        sub: user.id.clone(),
        role: user.role,
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to sign token")?;

    Ok((token, expires_at))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AppError::unauthorized("Invalid or expired token")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: String::new(),
            name: "Jane".to_string(),
            phone: None,
            role: Role::Doctor,
            status: UserStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
            last_login_at: None,
        }
    }

    #[tokio::test]
    async fn test_password_round_trip() {
        let hash = hash_password("correct horse", 4).await.unwrap();

        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
        assert!(!verify_password("anything", "not-a-bcrypt-hash").await.unwrap());
    }

    #[test]
    fn test_token_carries_subject_and_role() {
        let (token, expires_at) = issue_token(&user(), "secret", 2).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let err = issue_token(&user(), "secret", i64::MAX).unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_token_with_wrong_secret_is_unauthorized() {
        let (token, _) = issue_token(&user(), "secret", 2).unwrap();

        let err = verify_token(&token, "other-secret").unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(verify_token("garbage", "secret").unwrap_err().code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = Claims {
            sub: "user-1".to_string(),
            role: Role::Patient,
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(verify_token(&token, "secret").is_err());
    }
}

//! User registration, login and bearer-token verification.
//!
//! | Submodule | Purpose |
//! |-----------|---------|
//! | [`password`] | PBKDF2-HMAC-SHA256 password hashes (`pbkdf2` PHC strings) |
//! | [`token`] | HS256 JWT encode / decode (`jsonwebtoken`) |
//! | [`store`] | `users` table access |

pub mod password;
pub mod store;
pub mod token;

use axum::http::StatusCode;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::AuthConfig;
use store::UserStore;
use token::Claims;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user already exists")]
    UserExists,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UserExists => StatusCode::CONFLICT,
            AuthError::MissingField(_) => StatusCode::BAD_REQUEST,
            AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::CONFLICT => "conflict",
            StatusCode::BAD_REQUEST => "bad_request",
            _ => "internal",
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// An authenticated caller, attached to requests by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
}

pub struct Authenticator {
    store: UserStore,
    secret: Vec<u8>,
    token_ttl: chrono::Duration,
    hash_iterations: u32,
}

impl Authenticator {
    pub fn new(store: UserStore, secret: impl Into<String>, config: &AuthConfig) -> Self {
        Self {
            store,
            secret: secret.into().into_bytes(),
            token_ttl: chrono::Duration::minutes(config.token_ttl_minutes),
            hash_iterations: config.hash_iterations,
        }
    }

    /// Build from a pool, resolving the signing secret from the environment
    /// or config.
    pub fn from_config(pool: SqlitePool, config: &AuthConfig) -> Self {
        Self::new(UserStore::new(pool), config.resolve_secret(), config)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }

        let iterations = self.hash_iterations;
        let plain = password.to_string();
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain, iterations))
            .await
            .map_err(|e| AuthError::Storage(format!("password hashing failed: {}", e)))??;

        let user = self.store.create(username, &hash).await?;
        tracing::info!(user_id = user.id, username = %user.username, "user registered");

        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let Some(user) = self.store.find_by_username(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let plain = password.to_string();
        let stored = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || password::verify_password(&plain, &stored))
            .await
            .map_err(|e| AuthError::Storage(format!("password verification failed: {}", e)))?;

        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }

    pub fn issue_token(&self, principal: &Principal) -> Result<String, AuthError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: principal.username.clone(),
            user_id: principal.user_id,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };
        token::encode(&claims, &self.secret)
    }

    /// Check signature and expiry, then that the user still exists.
    pub async fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = token::decode(token, &self.secret)?;

        match self.store.find_by_id(claims.user_id).await? {
            Some(user) if user.username == claims.sub => Ok(Principal {
                user_id: user.id,
                username: user.username,
            }),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn authenticator(ttl_minutes: i64) -> (TempDir, Authenticator) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("users.sqlite"))
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        let config = AuthConfig {
            secret: None,
            token_ttl_minutes: ttl_minutes,
            hash_iterations: 10,
        };
        (tmp, Authenticator::new(UserStore::new(pool), "test-secret", &config))
    }

    #[tokio::test]
    async fn test_register_login_verify() {
        let (_tmp, auth) = authenticator(120).await;
        let registered = auth.register("alice", "s3cret").await.unwrap();

        let principal = auth.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(principal, registered);

        let token = auth.issue_token(&principal).unwrap();
        assert_eq!(auth.verify_token(&token).await.unwrap(), principal);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user() {
        let (_tmp, auth) = authenticator(120).await;
        auth.register("alice", "s3cret").await.unwrap();

        assert!(matches!(
            auth.authenticate("alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.authenticate("bob", "s3cret").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_tmp, auth) = authenticator(120).await;
        assert!(matches!(
            auth.register("", "pw").await,
            Err(AuthError::MissingField("username"))
        ));
        assert!(matches!(
            auth.register("alice", "").await,
            Err(AuthError::MissingField("password"))
        ));
        auth.register("alice", "pw").await.unwrap();
        assert!(matches!(
            auth.register("alice", "pw2").await,
            Err(AuthError::UserExists)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (_tmp, auth) = authenticator(-1).await;
        let principal = auth.register("alice", "s3cret").await.unwrap();
        let token = auth.issue_token(&principal).unwrap();
        assert!(matches!(
            auth.verify_token(&token).await,
            Err(AuthError::ExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_token_for_unknown_user_rejected() {
        let (_tmp, auth) = authenticator(120).await;
        let ghost = Principal {
            user_id: 42,
            username: "ghost".into(),
        };
        let token = auth.issue_token(&ghost).unwrap();
        assert!(matches!(
            auth.verify_token(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UserExists.code(), "conflict");
        assert_eq!(AuthError::MissingField("username").code(), "bad_request");
        assert_eq!(AuthError::Storage("disk".into()).code(), "internal");
    }
}

//! Identity provider boundary.
//!
//! The core treats authentication as a fallible black box behind the
//! [`IdentityProvider`] trait: create accounts, verify credentials, issue and
//! verify tokens, maintain role claims. The default implementation keeps
//! accounts in a local `accounts` table (argon2id password hashes) and issues
//! HS256 JWTs; swapping in a hosted provider only touches this module.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::common::ApiError;
use crate::domains::access::Role;
use crate::kernel::jwt::JwtService;

/// Resolved caller identity: who is making the request, with which role.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email is already in use")]
    EmailTaken,
    #[error("password too weak, minimum 6 characters")]
    WeakPassword,
    #[error("account not found")]
    AccountNotFound,
    #[error("identity provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidToken => ApiError::Authentication(e.to_string()),
            IdentityError::InvalidCredentials => ApiError::Authentication(e.to_string()),
            IdentityError::EmailTaken => ApiError::Conflict(e.to_string()),
            IdentityError::WeakPassword => ApiError::Validation(e.to_string()),
            IdentityError::AccountNotFound => ApiError::NotFound(e.to_string()),
            IdentityError::Provider(inner) => {
                ApiError::Dependency(format!("identity provider: {}", inner))
            }
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account with credentials and an initial role claim.
    async fn create_account(
        &self,
        user_id: Uuid,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<(), IdentityError>;

    /// Verify credentials and issue a session token.
    async fn login(&self, email: &str, password: &str) -> Result<String, IdentityError>;

    /// Verify a session token and resolve the caller identity.
    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError>;

    /// Replace the role claim on an account. Outstanding tokens keep the old
    /// role until they expire.
    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), IdentityError>;

    /// Change the login email of an account.
    async fn update_email(&self, user_id: Uuid, email: &str) -> Result<(), IdentityError>;

    /// Delete an account.
    async fn delete_account(&self, user_id: Uuid) -> Result<(), IdentityError>;
}

/// Hash a password using argon2id. Returns the PHC-formatted hash string
/// that includes the salt and parameters.
fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::Provider(anyhow::anyhow!("failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, IdentityError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| IdentityError::Provider(anyhow::anyhow!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    user_id: Uuid,
    email: String,
    password_hash: String,
    role: Role,
}

/// Default identity provider: local accounts table + JWT sessions.
pub struct JwtIdentityProvider {
    pool: PgPool,
    jwt: JwtService,
}

impl JwtIdentityProvider {
    pub fn new(pool: PgPool, jwt: JwtService) -> Self {
        Self { pool, jwt }
    }

    fn validate_email(email: &str) -> Result<(), IdentityError> {
        // Minimal shape check; uniqueness is enforced by the accounts table.
        if email.contains('@') && !email.starts_with('@') && !email.ends_with('@') {
            Ok(())
        } else {
            Err(IdentityError::Provider(anyhow::anyhow!(
                "invalid email format: {email}"
            )))
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn create_account(
        &self,
        user_id: Uuid,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<(), IdentityError> {
        Self::validate_email(email)?;
        if password.len() < 6 {
            return Err(IdentityError::WeakPassword);
        }

        let hash = hash_password(password)?;

        let result = sqlx::query(
            "INSERT INTO accounts (user_id, email, password_hash, role) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(email)
        .bind(&hash)
        .bind(role)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(IdentityError::EmailTaken)
            }
            Err(e) => Err(IdentityError::Provider(e.into())),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        let account =
            sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IdentityError::Provider(e.into()))?
                .ok_or(IdentityError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash)? {
            return Err(IdentityError::InvalidCredentials);
        }

        self.jwt
            .create_token(account.user_id, account.email, account.role)
            .map_err(IdentityError::Provider)
    }

    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError> {
        let claims = self
            .jwt
            .verify_token(token)
            .map_err(|_| IdentityError::InvalidToken)?;

        Ok(Identity {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        })
    }

    async fn set_role(&self, user_id: Uuid, role: Role) -> Result<(), IdentityError> {
        let result = sqlx::query("UPDATE accounts SET role = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(|e| IdentityError::Provider(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::AccountNotFound);
        }
        Ok(())
    }

    async fn update_email(&self, user_id: Uuid, email: &str) -> Result<(), IdentityError> {
        Self::validate_email(email)?;

        let result = sqlx::query("UPDATE accounts SET email = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(email)
            .execute(&self.pool)
            .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => Err(IdentityError::AccountNotFound),
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(IdentityError::EmailTaken)
            }
            Err(e) => Err(IdentityError::Provider(e.into())),
        }
    }

    async fn delete_account(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let result = sqlx::query("DELETE FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| IdentityError::Provider(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::AccountNotFound);
        }
        Ok(())
    }
}

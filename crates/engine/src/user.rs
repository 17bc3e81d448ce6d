//! User service: operator registration and credential checks.
//!
//! Passwords are stored as bcrypt hashes only. Hashing runs on the blocking
//! pool so it does not stall the async runtime.

use bcrypt::{DEFAULT_COST, hash, verify};
use sqlx::PgPool;
use uuid::Uuid;

use crm_common::error::AppError;
use crm_common::types::User;

pub struct UserService;

const MIN_PASSWORD_LEN: usize = 8;

impl UserService {
    /// Register a new operator account.
    pub async fn register(pool: &PgPool, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing aborted: {}", e)))??;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("User {} already exists", email))
            }
            other => AppError::Database(other),
        })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials. Unknown email and wrong password look the same to the caller.
    pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<User, AppError> {
        let invalid = || AppError::Auth("Invalid email or password".to_string());
        let email = normalize_email(email).map_err(|_| invalid())?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await?
            .ok_or_else(invalid)?;

        let password = password.to_string();
        let stored = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| AppError::Internal(format!("password check aborted: {}", e)))??;

        if !matches {
            tracing::warn!(user_id = %user.id, "Rejected login with wrong password");
            return Err(invalid());
        }

        Ok(user)
    }
}

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Compare a plain password against a stored bcrypt hash.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    verify(password, password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::Validation("a valid email is required".to_string())),
    }
}

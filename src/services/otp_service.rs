//! Email one-time passcodes.
//!
//! # Flow
//!
//! 1. `issue`: enforce resend cooldown, invalidate older codes, store the hash of a
//!    fresh 6-digit code and hand it back for delivery (`discard` undoes it when
//!    delivery fails)
//! 2. `verify`: lock the newest live code, check expiry and attempts, compare
//!    hashes, consume on success
//!
//! Failed attempts are committed before the error is returned, so the attempt
//! counter survives the failed request.

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::{config::Config, db::DbPool, error::AppError, models::otp::EmailOtp};

/// Hex SHA-256 of `"<email>:<code>"`.
pub fn hash_code(email: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Uniform 6-digit code, leading zeros kept.
pub fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

/// Issue a new code for `email` (already normalized) and return it for delivery.
///
/// # Errors
///
/// - `TooManyRequests`: a code was issued within the resend cooldown
pub async fn issue(pool: &DbPool, config: &Config, email: &str) -> Result<String, AppError> {
    let mut tx = pool.begin().await?;

    // Serialize concurrent sends for the same address until commit
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(email)
        .execute(&mut *tx)
        .await?;

    let last_sent: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar("SELECT MAX(created_at) FROM email_otps WHERE email = $1")
            .bind(email)
            .fetch_one(&mut *tx)
            .await?;

    if let Some(last_sent) = last_sent {
        let elapsed = (Utc::now() - last_sent).num_seconds();
        let wait = config.otp_resend_cooldown_seconds - elapsed;
        if wait > 0 {
            tx.rollback().await?;
            return Err(AppError::TooManyRequests(format!(
                "Please wait {wait} seconds before requesting a new code"
            )));
        }
    }

    let code = generate_code();
    let expires_at = Utc::now() + Duration::minutes(config.otp_ttl_minutes);

    // Only the newest code is ever valid
    sqlx::query("UPDATE email_otps SET consumed_at = NOW() WHERE email = $1 AND consumed_at IS NULL")
        .bind(email)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO email_otps (email, code_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(email)
        .bind(hash_code(email, &code))
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(code)
}

/// Drop a code that could not be delivered, so the resend cooldown does not
/// apply to the retry.
pub async fn discard(pool: &DbPool, email: &str, code: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM email_otps WHERE email = $1 AND code_hash = $2 AND consumed_at IS NULL")
        .bind(email)
        .bind(hash_code(email, code))
        .execute(pool)
        .await?;
    Ok(())
}

/// Check `code` for `email` (already normalized) and consume it on success.
///
/// # Errors
///
/// - `InvalidRequest("Code expired or not found")`
/// - `Forbidden("Too many attempts")`: the code is locked
/// - `InvalidRequest("Invalid code ...")`: mismatch; the attempt is recorded
pub async fn verify(
    pool: &DbPool,
    config: &Config,
    email: &str,
    code: &str,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let otp = sqlx::query_as::<_, EmailOtp>(
        r#"
        SELECT * FROM email_otps
        WHERE email = $1 AND consumed_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *tx)
    .await?;

    let otp = match otp {
        Some(otp) if otp.expires_at > Utc::now() => otp,
        _ => {
            tx.rollback().await?;
            return Err(AppError::InvalidRequest(
                "Code expired or not found".to_string(),
            ));
        }
    };

    if otp.attempts >= config.otp_max_attempts {
        tx.rollback().await?;
        return Err(AppError::Forbidden("Too many attempts".to_string()));
    }

    if hash_code(email, code) != otp.code_hash {
        let attempts: i32 = sqlx::query_scalar(
            "UPDATE email_otps SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(otp.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let remaining = (config.otp_max_attempts - attempts).max(0);
        tracing::info!(email, attempts, "Sign-in code mismatch");
        return Err(AppError::InvalidRequest(format!(
            "Invalid code ({remaining} attempts remaining)"
        )));
    }

    sqlx::query("UPDATE email_otps SET consumed_at = NOW() WHERE id = $1")
        .bind(otp.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(())
}

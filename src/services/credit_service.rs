//! Credit service - the ledger behind every AI feature.
//!
//! This service handles:
//! - Atomic balance updates with a matching `credit_logs` row
//! - Balance validation before spending
//! - Idempotent grants and refunds keyed by `reference`
//!
//! # Atomicity Guarantees
//!
//! Every change runs inside a PostgreSQL transaction. Spending locks the profile
//! row with `FOR UPDATE` before checking the balance, so concurrent jobs cannot
//! overdraw it. The `credits >= 0` CHECK constraint backs this up.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        credit::{CreditLog, CreditReason},
        job::Job,
    },
    response::Pagination,
};

/// Spend `amount` credits inside the caller's transaction.
///
/// # Errors
///
/// - `InvalidRequest`: amount is zero or negative
/// - `NotFound`: profile doesn't exist
/// - `InsufficientCredits`: balance is below `amount`
pub async fn deduct(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i64,
    reason: CreditReason,
    job_id: Option<Uuid>,
) -> Result<CreditLog, AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    // Lock the profile row; held until the caller commits
    let balance: i64 = sqlx::query_scalar("SELECT credits FROM profiles WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Profile"))?;

    if balance < amount {
        return Err(AppError::InsufficientCredits);
    }

    let balance_after: i64 = sqlx::query_scalar(
        r#"
        UPDATE profiles
        SET credits = credits - $1,
            updated_at = NOW()
        WHERE id = $2
        RETURNING credits
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let log = insert_log(conn, user_id, -amount, balance_after, reason, job_id, None).await?;

    tracing::info!(%user_id, amount, balance_after, reason = reason.as_str(), "Credits deducted");
    Ok(log)
}

/// Add credits inside the caller's transaction.
///
/// Returns `None` when `reference` was already applied.
pub async fn grant_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i64,
    reason: CreditReason,
    reference: Option<&str>,
    job_id: Option<Uuid>,
) -> Result<Option<CreditLog>, AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    // Check for an earlier grant with the same reference
    if let Some(reference) = reference {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM credit_logs WHERE reference = $1)")
                .bind(reference)
                .fetch_one(&mut *conn)
                .await?;
        if exists {
            return Ok(None);
        }
    }

    let balance_after: i64 = sqlx::query_scalar(
        r#"
        UPDATE profiles
        SET credits = credits + $1,
            updated_at = NOW()
        WHERE id = $2
        RETURNING credits
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Profile"))?;

    let log = insert_log(
        conn,
        user_id,
        amount,
        balance_after,
        reason,
        job_id,
        reference,
    )
    .await?;

    tracing::info!(%user_id, amount, balance_after, reason = reason.as_str(), "Credits granted");
    Ok(Some(log))
}

/// Add credits in their own transaction. Idempotent on `reference`.
pub async fn grant(
    pool: &DbPool,
    user_id: Uuid,
    amount: i64,
    reason: CreditReason,
    reference: Option<&str>,
    job_id: Option<Uuid>,
) -> Result<Option<CreditLog>, AppError> {
    let mut tx = pool.begin().await?;

    let log = match grant_in_tx(&mut *tx, user_id, amount, reason, reference, job_id).await {
        Ok(log) => log,
        // A concurrent grant with the same reference won the race
        Err(AppError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match tx.commit().await {
        Ok(()) => Ok(log),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Give back what a failed job cost, inside the caller's transaction.
///
/// Keyed by `refund:<job_id>`, so a job is refunded at most once.
pub async fn refund_job(
    conn: &mut PgConnection,
    job: &Job,
) -> Result<Option<CreditLog>, AppError> {
    if job.credits_cost <= 0 {
        return Ok(None);
    }
    let reference = refund_reference(job.id);
    grant_in_tx(
        conn,
        job.user_id,
        job.credits_cost,
        CreditReason::Refund,
        Some(&reference),
        Some(job.id),
    )
    .await
}

pub fn refund_reference(job_id: Uuid) -> String {
    format!("refund:{job_id}")
}

pub fn invoice_reference(invoice_id: &str) -> String {
    format!("invoice:{invoice_id}")
}

/// Current balance, or `NotFound` if the profile is gone.
pub async fn balance(pool: &DbPool, user_id: Uuid) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT credits FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Profile"))
}

/// Newest-first ledger page for one user.
pub async fn list_logs(
    pool: &DbPool,
    user_id: Uuid,
    page: Pagination,
) -> Result<Vec<CreditLog>, AppError> {
    let logs = sqlx::query_as::<_, CreditLog>(
        r#"
        SELECT * FROM credit_logs
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

async fn insert_log(
    conn: &mut PgConnection,
    user_id: Uuid,
    delta: i64,
    balance_after: i64,
    reason: CreditReason,
    job_id: Option<Uuid>,
    reference: Option<&str>,
) -> Result<CreditLog, AppError> {
    let log = sqlx::query_as::<_, CreditLog>(
        r#"
        INSERT INTO credit_logs (user_id, delta, balance_after, reason, job_id, reference)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(delta)
    .bind(balance_after)
    .bind(reason.as_str())
    .bind(job_id)
    .bind(reference)
    .fetch_one(&mut *conn)
    .await?;

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            refund_reference(id),
            "refund:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(invoice_reference("in_123"), "invoice:in_123");
    }
}

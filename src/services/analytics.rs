//! Best-effort product analytics and other side effects.
//!
//! Nothing here may fail a request: side effects are awaited together with
//! `join_all` and failures are only logged.

use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppError};

pub async fn track(
    pool: &DbPool,
    user_id: Option<Uuid>,
    event: &str,
    properties: Value,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO analytics_events (user_id, event, properties) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(event)
        .bind(properties)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run named side effects concurrently, logging the ones that fail.
pub async fn dispatch(effects: Vec<(&'static str, BoxFuture<'_, Result<(), AppError>>)>) {
    let (names, futures): (Vec<_>, Vec<_>) = effects.into_iter().unzip();
    for (name, result) in names.into_iter().zip(join_all(futures).await) {
        if let Err(e) = result {
            tracing::warn!(effect = name, error = %e, "Side effect failed");
        }
    }
}

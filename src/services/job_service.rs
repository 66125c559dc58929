//! Generation job service.
//!
//! This service handles:
//! - Pricing and charging a job before it reaches the provider
//! - Submitting to the provider and recording the outcome
//! - Applying provider status updates (polling and webhook share one path)
//! - Refunding jobs that fail or get canceled
//!
//! # Atomicity Guarantees
//!
//! The credit deduction, the `pending` job row and its `created` event are
//! written in one transaction. Status updates lock the job row, so a webhook and
//! a poll racing on the same job apply at most one terminal transition, and the
//! refund for it is written in that same transaction.

use serde_json::{Value, json};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        credit::CreditReason,
        effect::EffectTemplate,
        job::{CreateJobRequest, Job, JobStatus},
    },
    response::Pagination,
    services::{
        credit_service,
        generation_provider::{GenerationClient, ProviderUpdate},
    },
};

const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit job to the provider";
const DEFAULT_FAILURE_MESSAGE: &str = "Generation failed";

/// Validate, charge, store and submit a new job.
///
/// # Flow
///
/// 1. Validate the request (400)
/// 2. Require the provider (503 when generation is off)
/// 3. Resolve the effect template, if any
/// 4. Deduct credits, insert the job and its `created` event in one transaction
/// 5. Submit; on failure mark the job failed, refund and return 502
pub async fn create_job(
    pool: &DbPool,
    provider: Option<&GenerationClient>,
    user_id: Uuid,
    req: CreateJobRequest,
) -> Result<Job, AppError> {
    req.validate()?;
    req.check_kind_rules(req.effect_id.is_some())
        .map_err(AppError::InvalidRequest)?;

    let provider = provider.ok_or(AppError::FeatureDisabled)?;

    let effect = match req.effect_id {
        Some(effect_id) => Some(find_effect_for(pool, effect_id, &req).await?),
        None => None,
    };

    let (model, prompt, cost) = match &effect {
        Some(effect) => (
            effect.model.clone(),
            effect.render_prompt(&req.prompt),
            effect.credits_cost.unwrap_or_else(|| req.credit_cost()),
        ),
        None => (req.model.clone(), req.prompt.trim().to_string(), req.credit_cost()),
    };

    let mut tx = pool.begin().await?;

    let job = sqlx::query_as::<_, Job>(
        r#"
        INSERT INTO ai_jobs
            (user_id, kind, model, status, prompt, aspect_ratio, duration_seconds,
             num_outputs, effect_id, credits_cost, input)
        VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(req.kind.as_str())
    .bind(&model)
    .bind(&prompt)
    .bind(req.aspect_ratio.as_deref())
    .bind(req.effective_duration())
    .bind(req.effective_num_outputs())
    .bind(req.effect_id)
    .bind(cost)
    .bind(json!({ "urls": req.input_urls }))
    .fetch_one(&mut *tx)
    .await?;

    if cost > 0 {
        credit_service::deduct(&mut *tx, user_id, cost, CreditReason::Generation, Some(job.id))
            .await?;
    }

    record_event(
        &mut *tx,
        job.id,
        "created",
        json!({ "credits_cost": cost, "effect_id": req.effect_id }),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(job_id = %job.id, %user_id, kind = %req.kind, cost, "Job created");

    let provider_job_id = match provider.submit(&job).await {
        Ok(provider_job_id) => provider_job_id,
        Err(e) => {
            tracing::error!(job_id = %job.id, error = %e, "Provider submission failed");
            abandon(pool, &job, None, "submit_failed", &e).await?;
            return Err(AppError::Upstream(format!("submit failed for job {}", job.id)));
        }
    };

    // The provider is running the job from here on; never leave it pending and charged
    match mark_submitted(pool, job.id, &provider_job_id).await {
        Ok(job) => Ok(job),
        Err(e) => {
            tracing::error!(job_id = %job.id, %provider_job_id, error = %e, "Recording submission failed");
            if let Err(cleanup) =
                abandon(pool, &job, Some(&provider_job_id), "record_failed", &e).await
            {
                tracing::error!(job_id = %job.id, error = %cleanup, "Refund after submission failed");
            }
            Err(AppError::Upstream(format!("submit failed for job {}", job.id)))
        }
    }
}

/// Move a freshly submitted job to `processing` together with its `submitted` event.
async fn mark_submitted(
    pool: &DbPool,
    job_id: Uuid,
    provider_job_id: &str,
) -> Result<Job, AppError> {
    let mut tx = pool.begin().await?;

    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE ai_jobs
        SET status = 'processing', provider_job_id = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(provider_job_id)
    .fetch_one(&mut *tx)
    .await?;

    record_event(
        &mut *tx,
        job_id,
        "submitted",
        json!({ "provider_job_id": provider_job_id }),
    )
    .await?;

    tx.commit().await?;
    Ok(job)
}

/// Effect template usable for `req`: active and of the same kind.
async fn find_effect_for(
    pool: &DbPool,
    effect_id: Uuid,
    req: &CreateJobRequest,
) -> Result<EffectTemplate, AppError> {
    let effect = sqlx::query_as::<_, EffectTemplate>(
        "SELECT * FROM effect_templates WHERE id = $1 AND is_active = true",
    )
    .bind(effect_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Effect"))?;

    if effect.kind != req.kind.as_str() {
        return Err(AppError::InvalidRequest(format!(
            "Effect {} is for {} jobs, not {}",
            effect.slug, effect.kind, req.kind
        )));
    }
    Ok(effect)
}

/// Fail a job that never made it to `processing` and refund it.
///
/// `provider_job_id` is stored when the provider did accept the job, so its later
/// callbacks find a terminal job and are ignored.
async fn abandon(
    pool: &DbPool,
    job: &Job,
    provider_job_id: Option<&str>,
    event_type: &str,
    cause: &AppError,
) -> Result<Job, AppError> {
    let mut tx = pool.begin().await?;

    let failed = sqlx::query_as::<_, Job>(
        r#"
        UPDATE ai_jobs
        SET status = 'failed',
            error_message = $2,
            provider_job_id = COALESCE($3, provider_job_id),
            completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job.id)
    .bind(SUBMIT_FAILED_MESSAGE)
    .bind(provider_job_id)
    .fetch_one(&mut *tx)
    .await?;

    credit_service::refund_job(&mut *tx, &failed).await?;

    record_event(
        &mut *tx,
        job.id,
        event_type,
        json!({ "error": cause.to_string() }),
    )
    .await?;

    tx.commit().await?;
    Ok(failed)
}

/// Caller's jobs, newest first, optionally filtered by status.
pub async fn list_jobs(
    pool: &DbPool,
    user_id: Uuid,
    status: Option<JobStatus>,
    page: Pagination,
) -> Result<Vec<Job>, AppError> {
    let jobs = sqlx::query_as::<_, Job>(
        r#"
        SELECT * FROM ai_jobs
        WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(status.map(JobStatus::as_str))
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok(jobs)
}

/// Fetch one of the caller's jobs, refreshing it from the provider while in flight.
///
/// A failed poll is logged and the stored job is returned as-is.
pub async fn get_job(
    pool: &DbPool,
    provider: Option<&GenerationClient>,
    user_id: Uuid,
    job_id: Uuid,
) -> Result<Job, AppError> {
    let job = sqlx::query_as::<_, Job>("SELECT * FROM ai_jobs WHERE id = $1 AND user_id = $2")
        .bind(job_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Job"))?;

    if job.status().is_terminal() {
        return Ok(job);
    }
    let Some(provider) = provider else {
        return Ok(job);
    };
    let Some(provider_job_id) = job.provider_job_id.clone() else {
        return Ok(job);
    };

    match provider.fetch(&provider_job_id).await {
        Ok(remote) => apply_provider_update(pool, job.id, remote.into()).await,
        Err(e) => {
            tracing::warn!(job_id = %job.id, error = %e, "Provider poll failed");
            Ok(job)
        }
    }
}

pub async fn find_by_provider_id(
    pool: &DbPool,
    provider_job_id: &str,
) -> Result<Option<Job>, AppError> {
    let job = sqlx::query_as::<_, Job>("SELECT * FROM ai_jobs WHERE provider_job_id = $1")
        .bind(provider_job_id)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// Move a job to the status the provider reports.
///
/// Terminal jobs are returned unchanged, as are updates that report the status
/// the job already has. Failed and canceled jobs are refunded in the same
/// transaction as the status change.
pub async fn apply_provider_update(
    pool: &DbPool,
    job_id: Uuid,
    update: ProviderUpdate,
) -> Result<Job, AppError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Job>("SELECT * FROM ai_jobs WHERE id = $1 FOR UPDATE")
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Job"))?;

    let from = current.status();
    if from.is_terminal() || from == update.status {
        tx.rollback().await?;
        return Ok(current);
    }

    let error_message = match update.status {
        JobStatus::Failed => Some(
            update
                .error
                .clone()
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        ),
        _ => update.error.clone(),
    };
    let output_urls: Option<Value> =
        (!update.output_urls.is_empty()).then(|| json!(update.output_urls));

    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE ai_jobs
        SET status = $2,
            output_urls = COALESCE($3, output_urls),
            error_message = COALESCE($4, error_message),
            completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(update.status.as_str())
    .bind(output_urls)
    .bind(error_message)
    .bind(update.status.is_terminal())
    .fetch_one(&mut *tx)
    .await?;

    record_event(
        &mut *tx,
        job_id,
        "status_changed",
        json!({
            "from": from.as_str(),
            "to": update.status.as_str(),
            "outputs": update.output_urls.len(),
        }),
    )
    .await?;

    if update.status.refunds_credits() {
        credit_service::refund_job(&mut *tx, &job).await?;
    }

    tx.commit().await?;

    tracing::info!(%job_id, from = from.as_str(), to = update.status.as_str(), "Job status changed");
    Ok(job)
}

pub async fn record_event<'e, E>(
    executor: E,
    job_id: Uuid,
    event_type: &str,
    payload: Value,
) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("INSERT INTO job_events (job_id, event_type, payload) VALUES ($1, $2, $3)")
        .bind(job_id)
        .bind(event_type)
        .bind(payload)
        .execute(executor)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::profile_service::{self, Identity};

    async fn pending_job(pool: &DbPool, cost: i64) -> Job {
        let identity = Identity {
            email: "ada@example.com",
            ..Default::default()
        };
        let (profile, _) = profile_service::find_or_create(pool, identity, 0)
            .await
            .unwrap();
        sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO ai_jobs (user_id, kind, model, status, credits_cost)
            VALUES ($1, 'video', 'motion-v2', 'pending', $2)
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(cost)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn accepted_job_that_cannot_be_recorded_is_failed_and_refunded(pool: DbPool) {
        let job = pending_job(&pool, 12).await;
        let cause = AppError::Internal("connection reset".to_string());

        let failed = abandon(&pool, &job, Some("gen_accepted"), "record_failed", &cause)
            .await
            .unwrap();

        assert_eq!(failed.status(), JobStatus::Failed);
        assert!(failed.completed_at.is_some());
        assert_eq!(credit_service::balance(&pool, job.user_id).await.unwrap(), 12);

        // The provider's callback finds the job and cannot revive it
        let found = find_by_provider_id(&pool, "gen_accepted")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, job.id);

        let late = ProviderUpdate {
            status: JobStatus::Succeeded,
            output_urls: vec!["https://cdn.example.com/out.mp4".to_string()],
            error: None,
        };
        let after = apply_provider_update(&pool, job.id, late).await.unwrap();
        assert_eq!(after.status(), JobStatus::Failed);
        assert_eq!(credit_service::balance(&pool, job.user_id).await.unwrap(), 12);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejected_submission_keeps_no_provider_id(pool: DbPool) {
        let job = pending_job(&pool, 4).await;
        let cause = AppError::Upstream("provider responded 500".to_string());

        let failed = abandon(&pool, &job, None, "submit_failed", &cause)
            .await
            .unwrap();

        assert_eq!(failed.status(), JobStatus::Failed);
        assert!(failed.provider_job_id.is_none());
        assert_eq!(failed.error_message.as_deref(), Some(SUBMIT_FAILED_MESSAGE));

        let events: Vec<String> =
            sqlx::query_scalar("SELECT event_type FROM job_events WHERE job_id = $1")
                .bind(job.id)
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(events, vec!["submit_failed".to_string()]);
    }
}

//! Subscriptions and the payment processor webhook.
//!
//! The processor is the source of truth for subscription state. Local rows are
//! a mirror, written after checkout, cancel and resume calls and by webhooks.
//! Paid invoices are what turn into credits.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::{credit::CreditReason, plan::Plan, profile::Profile, subscription::Subscription},
    services::{
        credit_service,
        payment_client::{CheckoutParams, PaymentClient, PriceRef, ProcessorSubscription},
    },
};

/// Processor webhook envelope.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEventData {
    pub object: Value,
}

#[derive(Debug, Deserialize)]
struct CompletedCheckout {
    customer: Option<String>,
    subscription: Option<String>,
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PaidInvoice {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    lines: InvoiceLines,
}

#[derive(Debug, Default, Deserialize)]
struct InvoiceLines {
    #[serde(default)]
    data: Vec<InvoiceLine>,
}

#[derive(Debug, Deserialize)]
struct InvoiceLine {
    price: Option<PriceRef>,
}

pub async fn get_subscription(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<Option<Subscription>, AppError> {
    let subscription =
        sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(subscription)
}

/// Start a subscription checkout and return the hosted checkout URL.
///
/// # Errors
///
/// - `InvalidRequest`: unknown plan, or the user already has a live subscription
/// - `FeatureDisabled`: no processor, or no price configured for the plan
pub async fn create_checkout(
    pool: &DbPool,
    config: &Config,
    payments: Option<&PaymentClient>,
    profile: &Profile,
    plan_id: &str,
) -> Result<String, AppError> {
    let plan = Plan::find(plan_id)
        .ok_or_else(|| AppError::InvalidRequest(format!("Unknown plan: {plan_id}")))?;
    let payments = payments.ok_or(AppError::FeatureDisabled)?;
    let price_id = plan.price_id(config).ok_or(AppError::FeatureDisabled)?;

    if get_subscription(pool, profile.id)
        .await?
        .is_some_and(|s| s.is_live())
    {
        return Err(AppError::InvalidRequest(
            "You already have an active subscription".to_string(),
        ));
    }

    let origin = config.site_origin();
    let session = payments
        .create_checkout_session(CheckoutParams {
            user_id: profile.id,
            email: &profile.email,
            customer_id: profile.payment_customer_id.as_deref(),
            plan_id: plan.id,
            price_id,
            success_url: format!("{origin}/dashboard?checkout=success"),
            cancel_url: format!("{origin}/pricing?checkout=canceled"),
        })
        .await?;

    tracing::info!(user_id = %profile.id, plan = plan.id, session_id = %session.id, "Checkout session created");

    session
        .url
        .ok_or_else(|| AppError::Upstream(format!("checkout session {} has no URL", session.id)))
}

/// Turn on cancel-at-period-end.
pub async fn cancel(
    pool: &DbPool,
    payments: Option<&PaymentClient>,
    user_id: Uuid,
) -> Result<Subscription, AppError> {
    let subscription = get_subscription(pool, user_id)
        .await?
        .ok_or(AppError::NotFound("Subscription"))?;

    if subscription.cancel_at_period_end || subscription.status == "canceled" {
        return Err(AppError::InvalidRequest(
            "Subscription is already canceled".to_string(),
        ));
    }

    let payments = payments.ok_or(AppError::FeatureDisabled)?;
    let remote = payments
        .set_cancel_at_period_end(&subscription.provider_subscription_id, true)
        .await?;

    tracing::info!(%user_id, subscription_id = %remote.id, "Subscription set to cancel");
    mirror(pool, subscription.id, &remote).await
}

/// Undo a pending cancellation.
pub async fn resume(
    pool: &DbPool,
    payments: Option<&PaymentClient>,
    user_id: Uuid,
) -> Result<Subscription, AppError> {
    let subscription = get_subscription(pool, user_id)
        .await?
        .ok_or(AppError::NotFound("Subscription"))?;

    if !subscription.cancel_at_period_end || subscription.status == "canceled" {
        return Err(AppError::InvalidRequest(
            "Subscription is not set to cancel".to_string(),
        ));
    }

    let payments = payments.ok_or(AppError::FeatureDisabled)?;
    let remote = payments
        .set_cancel_at_period_end(&subscription.provider_subscription_id, false)
        .await?;

    tracing::info!(%user_id, subscription_id = %remote.id, "Subscription resumed");
    mirror(pool, subscription.id, &remote).await
}

/// Apply one verified processor event. Returns `true` when the event id was
/// already processed.
///
/// Every branch is idempotent on its own (upserts, reference-keyed grants), so
/// the event id is recorded only after the branch succeeds. A failed event is
/// retried by the processor in full.
pub async fn handle_payment_event(
    pool: &DbPool,
    config: &Config,
    payments: Option<&PaymentClient>,
    event: PaymentEvent,
    payload: Value,
) -> Result<bool, AppError> {
    let seen: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM payment_events WHERE id = $1)")
            .bind(&event.id)
            .fetch_one(pool)
            .await?;
    if seen {
        tracing::info!(event_id = %event.id, "Duplicate payment event");
        return Ok(true);
    }

    let object = event.data.object;
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            on_checkout_completed(pool, config, payments, parse(object)?).await?
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            sync_subscription(pool, config, &parse(object)?).await?
        }
        "customer.subscription.deleted" => {
            let remote: ProcessorSubscription = parse(object)?;
            sqlx::query(
                r#"
                UPDATE subscriptions
                SET status = 'canceled', cancel_at_period_end = false,
                    canceled_at = NOW(), updated_at = NOW()
                WHERE provider_subscription_id = $1
                "#,
            )
            .bind(&remote.id)
            .execute(pool)
            .await?;
            tracing::info!(subscription_id = %remote.id, "Subscription ended");
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            on_invoice_paid(pool, config, parse(object)?).await?
        }
        other => tracing::debug!(event_type = other, "Ignoring payment event"),
    }

    let inserted = sqlx::query(
        "INSERT INTO payment_events (id, event_type, payload) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
    )
    .bind(&event.id)
    .bind(&event.event_type)
    .bind(payload)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted == 0)
}

fn parse<T: serde::de::DeserializeOwned>(object: Value) -> Result<T, AppError> {
    serde_json::from_value(object)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed event object: {e}")))
}

async fn on_checkout_completed(
    pool: &DbPool,
    config: &Config,
    payments: Option<&PaymentClient>,
    checkout: CompletedCheckout,
) -> Result<(), AppError> {
    let user_id = checkout
        .metadata
        .get("user_id")
        .or(checkout.client_reference_id.as_ref())
        .and_then(|id| id.parse::<Uuid>().ok());

    let Some(user_id) = user_id else {
        tracing::warn!("Checkout completed without a user reference");
        return Ok(());
    };

    if let Some(customer) = &checkout.customer {
        sqlx::query(
            "UPDATE profiles SET payment_customer_id = $2, updated_at = NOW() WHERE id = $1 AND payment_customer_id IS NULL",
        )
        .bind(user_id)
        .bind(customer)
        .execute(pool)
        .await?;
    }

    let Some(subscription_id) = checkout.subscription else {
        return Ok(());
    };

    let remote = match payments {
        Some(payments) => payments.get_subscription(&subscription_id).await?,
        None => ProcessorSubscription {
            id: subscription_id,
            status: "active".to_string(),
            customer: checkout.customer,
            cancel_at_period_end: false,
            current_period_start: None,
            current_period_end: None,
            metadata: checkout.metadata,
            items: Default::default(),
        },
    };

    let plan = resolve_plan(config, &remote);
    match plan {
        Some(plan) => {
            upsert(pool, user_id, plan, &remote).await?;
        }
        None => tracing::warn!(subscription_id = %remote.id, "Checkout for unknown plan"),
    }
    Ok(())
}

async fn sync_subscription(
    pool: &DbPool,
    config: &Config,
    remote: &ProcessorSubscription,
) -> Result<(), AppError> {
    let Some(user_id) = resolve_user(pool, remote).await? else {
        tracing::warn!(subscription_id = %remote.id, "Subscription for unknown user");
        return Ok(());
    };
    let Some(plan) = resolve_plan(config, remote) else {
        tracing::warn!(subscription_id = %remote.id, "Subscription for unknown plan");
        return Ok(());
    };
    upsert(pool, user_id, plan, remote).await?;
    Ok(())
}

async fn on_invoice_paid(
    pool: &DbPool,
    config: &Config,
    invoice: PaidInvoice,
) -> Result<(), AppError> {
    let from_subscription = match &invoice.subscription {
        Some(subscription_id) => sqlx::query_as::<_, (Uuid, String)>(
            "SELECT user_id, plan FROM subscriptions WHERE provider_subscription_id = $1",
        )
        .bind(subscription_id)
        .fetch_optional(pool)
        .await?
        .and_then(|(user_id, plan)| Plan::find(&plan).map(|plan| (user_id, plan))),
        None => None,
    };

    // The invoice can arrive before the subscription events
    let target = match from_subscription {
        Some(found) => Some(found),
        None => {
            let user_id = match &invoice.customer {
                Some(customer) => user_for_customer(pool, customer).await?,
                None => None,
            };
            let plan = invoice
                .lines
                .data
                .iter()
                .filter_map(|line| line.price.as_ref())
                .find_map(|price| Plan::from_price_id(config, &price.id));
            user_id.zip(plan)
        }
    };

    let Some((user_id, plan)) = target else {
        tracing::warn!(invoice_id = %invoice.id, "Paid invoice could not be matched to a plan");
        return Ok(());
    };

    let reference = credit_service::invoice_reference(&invoice.id);
    let granted = credit_service::grant(
        pool,
        user_id,
        plan.monthly_credits,
        CreditReason::SubscriptionGrant,
        Some(&reference),
        None,
    )
    .await?;

    if granted.is_none() {
        tracing::info!(invoice_id = %invoice.id, "Invoice credits already granted");
    }
    Ok(())
}

fn resolve_plan(config: &Config, remote: &ProcessorSubscription) -> Option<&'static Plan> {
    remote
        .metadata
        .get("plan")
        .and_then(|id| Plan::find(id))
        .or_else(|| remote.price_id().and_then(|p| Plan::from_price_id(config, p)))
}

async fn resolve_user(
    pool: &DbPool,
    remote: &ProcessorSubscription,
) -> Result<Option<Uuid>, AppError> {
    if let Some(user_id) = remote
        .metadata
        .get("user_id")
        .and_then(|id| id.parse::<Uuid>().ok())
    {
        return Ok(Some(user_id));
    }
    match &remote.customer {
        Some(customer) => user_for_customer(pool, customer).await,
        None => Ok(None),
    }
}

async fn user_for_customer(pool: &DbPool, customer: &str) -> Result<Option<Uuid>, AppError> {
    let user_id = sqlx::query_scalar("SELECT id FROM profiles WHERE payment_customer_id = $1")
        .bind(customer)
        .fetch_optional(pool)
        .await?;
    Ok(user_id)
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

async fn upsert(
    pool: &DbPool,
    user_id: Uuid,
    plan: &Plan,
    remote: &ProcessorSubscription,
) -> Result<Subscription, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions
            (user_id, provider_subscription_id, provider_customer_id, plan, status,
             cancel_at_period_end, current_period_start, current_period_end)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id) DO UPDATE
        SET provider_subscription_id = EXCLUDED.provider_subscription_id,
            provider_customer_id = COALESCE(EXCLUDED.provider_customer_id, subscriptions.provider_customer_id),
            plan = EXCLUDED.plan,
            status = EXCLUDED.status,
            cancel_at_period_end = EXCLUDED.cancel_at_period_end,
            current_period_start = COALESCE(EXCLUDED.current_period_start, subscriptions.current_period_start),
            current_period_end = COALESCE(EXCLUDED.current_period_end, subscriptions.current_period_end),
            canceled_at = CASE WHEN EXCLUDED.status = 'canceled' THEN COALESCE(subscriptions.canceled_at, NOW()) ELSE NULL END,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&remote.id)
    .bind(remote.customer.as_deref())
    .bind(plan.id)
    .bind(&remote.status)
    .bind(remote.cancel_at_period_end)
    .bind(timestamp(remote.current_period_start))
    .bind(timestamp(remote.current_period_end))
    .fetch_one(pool)
    .await?;

    tracing::info!(%user_id, plan = plan.id, status = %remote.status, "Subscription synced");
    Ok(subscription)
}

/// Copy processor state onto an existing row after cancel/resume.
async fn mirror(
    pool: &DbPool,
    id: Uuid,
    remote: &ProcessorSubscription,
) -> Result<Subscription, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET status = $2,
            cancel_at_period_end = $3,
            current_period_start = COALESCE($4, current_period_start),
            current_period_end = COALESCE($5, current_period_end),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&remote.status)
    .bind(remote.cancel_at_period_end)
    .bind(timestamp(remote.current_period_start))
    .bind(timestamp(remote.current_period_end))
    .fetch_one(pool)
    .await?;
    Ok(subscription)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("JWT_SECRET", "secret"),
            ("PAYMENT_PRICE_MAX", "price_max"),
        ])
        .unwrap()
    }

    #[test]
    fn event_envelope_parses() {
        let event: PaymentEvent = serde_json::from_str(
            r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{"id":"in_1","customer":"cus_1"}}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, "invoice.paid");
        let invoice: PaidInvoice = parse(event.data.object).unwrap();
        assert_eq!(invoice.id, "in_1");
        assert!(invoice.subscription.is_none());
        assert!(invoice.lines.data.is_empty());
    }

    #[test]
    fn plan_prefers_metadata_then_price() {
        let config = config();
        let mut remote: ProcessorSubscription = serde_json::from_str(
            r#"{"id":"sub_1","status":"active","metadata":{"plan":"basic"},"items":{"data":[{"price":{"id":"price_max"}}]}}"#,
        )
        .unwrap();
        assert_eq!(resolve_plan(&config, &remote).map(|p| p.id), Some("basic"));

        remote.metadata.clear();
        assert_eq!(resolve_plan(&config, &remote).map(|p| p.id), Some("max"));

        remote.items = Default::default();
        assert!(resolve_plan(&config, &remote).is_none());
    }

    #[test]
    fn malformed_objects_are_rejected() {
        let result: Result<PaidInvoice, _> = parse(serde_json::json!({"customer": "cus_1"}));
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn unix_seconds_convert() {
        assert_eq!(
            timestamp(Some(0)).map(|t| t.to_rfc3339()),
            Some("1970-01-01T00:00:00+00:00".to_string())
        );
        assert!(timestamp(None).is_none());
    }
}

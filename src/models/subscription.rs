//! Subscription mirror of the payment processor's state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a subscription record from the database.
///
/// # Database Table
///
/// Maps to `subscriptions`, one row per user. The processor is the source of
/// truth; rows are written by checkout/cancel/resume calls and by webhooks.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub provider_subscription_id: String,
    #[serde(skip_serializing)]
    pub provider_customer_id: Option<String>,
    pub plan: String,
    /// Processor status: `active`, `trialing`, `past_due`, `canceled`, ...
    pub status: String,
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Statuses that still entitle the user to the plan.
    pub fn is_live(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing" | "past_due")
    }
}

/// Request body for `POST /api/v1/billing/checkout`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

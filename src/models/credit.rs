//! Credit ledger models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Why a balance changed. Stored as text in `credit_logs.reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditReason {
    SignupBonus,
    Generation,
    Refund,
    SubscriptionGrant,
}

impl CreditReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CreditReason::SignupBonus => "signup_bonus",
            CreditReason::Generation => "generation",
            CreditReason::Refund => "refund",
            CreditReason::SubscriptionGrant => "subscription_grant",
        }
    }
}

/// One balance change.
///
/// # Database Table
///
/// Maps to `credit_logs`. `delta` is negative for spending. `balance_after` is
/// the profile balance once this change was applied. `reference`, when present,
/// is unique and makes the change idempotent (`invoice:<id>`, `refund:<job>`).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CreditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub delta: i64,
    pub balance_after: i64,
    pub reason: String,
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Response body for `GET /api/v1/credits`.
#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub balance: i64,
    pub logs: Vec<CreditLog>,
}

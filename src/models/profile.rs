//! User profile model and API response type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a user profile record from the database.
///
/// # Database Table
///
/// Maps to the `profiles` table. One row per email address.
///
/// # Credits
///
/// `credits` is the spendable balance. It is only ever changed by
/// `credit_service`, together with a `credit_logs` row, and is kept >= 0 by a
/// CHECK constraint.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub credits: i64,

    /// Code other people use in `/s/{code}` share links
    pub invite_code: String,

    /// Profile whose share link brought this user in
    pub referred_by: Option<Uuid>,

    /// Customer id at the payment processor, set by the first checkout
    pub payment_customer_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response body for `GET /api/v1/me`.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub credits: i64,
    pub invite_code: String,
    pub share_url: String,
    pub created_at: DateTime<Utc>,
}

/// Response body for a successful sign-in.
///
/// The token is also set as the `session` cookie; API clients send it back as
/// `Authorization: Bearer <token>`.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
    /// `true` when this sign-in created the account
    pub created: bool,
    pub user: ProfileResponse,
}

impl ProfileResponse {
    /// `site_origin` must not end with a slash.
    pub fn new(profile: Profile, site_origin: &str) -> Self {
        Self {
            share_url: format!("{site_origin}/s/{}", profile.invite_code),
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
            credits: profile.credits,
            invite_code: profile.invite_code,
            created_at: profile.created_at,
        }
    }
}

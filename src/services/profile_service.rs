//! Profile lookup and creation, shared by OTP and OAuth sign-in.

use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{credit::CreditReason, profile::Profile},
    services::credit_service,
};

const INVITE_CODE_LEN: usize = 8;

/// Who is signing in, as far as the identity source knows.
#[derive(Debug, Default)]
pub struct Identity<'a> {
    pub email: &'a str,
    pub display_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    /// Invite code from the `share_ref` cookie
    pub share_ref: Option<&'a str>,
}

pub fn generate_invite_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub async fn get(pool: &DbPool, user_id: Uuid) -> Result<Profile, AppError> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Profile"))
}

/// Profile id owning `invite_code`.
pub async fn referrer_for(pool: &DbPool, invite_code: &str) -> Result<Option<Uuid>, AppError> {
    let id = sqlx::query_scalar("SELECT id FROM profiles WHERE invite_code = $1")
        .bind(invite_code)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

/// Return the profile for `identity.email`, creating it on first sign-in.
///
/// The boolean is `true` when the profile was created by this call. New profiles
/// receive `signup_bonus` credits and are attributed to the share link in
/// `identity.share_ref`, if it resolves.
pub async fn find_or_create(
    pool: &DbPool,
    identity: Identity<'_>,
    signup_bonus: i64,
) -> Result<(Profile, bool), AppError> {
    let email = normalize_email(identity.email);

    // Existing users only get blank name/avatar filled in
    if let Some(profile) = sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles
        SET display_name = COALESCE(display_name, $2),
            avatar_url = COALESCE(avatar_url, $3),
            updated_at = NOW()
        WHERE email = $1
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(identity.display_name)
    .bind(identity.avatar_url)
    .fetch_optional(pool)
    .await?
    {
        return Ok((profile, false));
    }

    let referred_by = match identity.share_ref {
        Some(code) => referrer_for(pool, code).await?,
        None => None,
    };

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (email, display_name, avatar_url, invite_code, referred_by)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(identity.display_name)
    .bind(identity.avatar_url)
    .bind(generate_invite_code())
    .bind(referred_by)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(mut profile) = inserted else {
        // Another request created it between our UPDATE and INSERT
        tx.rollback().await?;
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = $1")
            .bind(&email)
            .fetch_one(pool)
            .await?;
        return Ok((profile, false));
    };

    if signup_bonus > 0 {
        let reference = format!("signup:{}", profile.id);
        if let Some(log) = credit_service::grant_in_tx(
            &mut *tx,
            profile.id,
            signup_bonus,
            CreditReason::SignupBonus,
            Some(&reference),
            None,
        )
        .await?
        {
            profile.credits = log.balance_after;
        }
    }

    tx.commit().await?;

    tracing::info!(user_id = %profile.id, referred = referred_by.is_some(), "Profile created");
    Ok((profile, true))
}

pub async fn record_share_visit(
    pool: &DbPool,
    invite_code: &str,
    referrer_id: Uuid,
    user_agent: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO share_visits (invite_code, referrer_id, user_agent) VALUES ($1, $2, $3)")
        .bind(invite_code)
        .bind(referrer_id)
        .bind(user_agent)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_codes_are_alphanumeric() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}

//! Session tokens.
//!
//! Sessions are HS256-signed JWTs. They are stateless: validation needs only the
//! secret, so the auth middleware never touches the database.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Profile id
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: i64,
    #[serde(skip)]
    pub max_age_secs: i64,
}

pub fn issue(
    user_id: Uuid,
    email: &str,
    secret: &str,
    ttl_hours: i64,
) -> Result<IssuedSession, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let max_age_secs = ttl_hours * 3600;
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        iat: now,
        exp: now + max_age_secs,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(IssuedSession {
        token,
        expires_at: claims.exp,
        max_age_secs,
    })
}

/// Check signature and expiry, returning the claims.
pub fn validate(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

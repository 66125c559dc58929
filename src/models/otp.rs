//! Email one-time passcode records and request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Represents an issued sign-in code.
///
/// # Database Table
///
/// Maps to the `email_otps` table. Only the SHA-256 of `"<email>:<code>"` is
/// stored. A code is usable while `consumed_at` is NULL, `expires_at` is in the
/// future and `attempts` is below the configured maximum.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmailOtp {
    pub id: Uuid,
    pub email: String,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/auth/otp/send`.
#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// Request body for `POST /api/v1/auth/otp/verify`.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    #[validate(custom(function = "validate_code_shape"))]
    pub code: String,
}

fn validate_code_shape(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("code").with_message("code must be 6 digits".into()))
    }
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub sent: bool,
    pub expires_in_seconds: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_must_be_six_digits() {
        let ok = VerifyOtpRequest {
            email: "a@b.co".into(),
            code: "012345".into(),
        };
        assert!(ok.validate().is_ok());

        for bad in ["12345", "1234567", "12a456", "      "] {
            let req = VerifyOtpRequest {
                email: "a@b.co".into(),
                code: bad.into(),
            };
            let errors = req.validate().unwrap_err();
            assert!(errors.field_errors().contains_key("code"), "{bad:?} accepted");
        }
    }

    #[test]
    fn email_is_validated() {
        let req = SendOtpRequest {
            email: "not-an-email".into(),
        };
        assert!(req.validate().is_err());
    }
}

//! Transactional email over SMTP.
//!
//! [`Mailer`] wraps the `lettre` async SMTP transport. It is only constructed when
//! `SMTP_HOST` is set; without it, email sign-in is reported as disabled.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::Mailbox,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};

use crate::config::Config;
use crate::error::AppError;

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Option<Self>, EmailError> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from: config.smtp_from.parse()?,
        }))
    }

    /// Send the sign-in code email.
    pub async fn send_otp(
        &self,
        to_email: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), EmailError> {
        let (subject, body) = otp_message(code, ttl_minutes);

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport.send(email).await?;

        tracing::info!(to = to_email, "Sign-in code email sent");
        Ok(())
    }
}

fn otp_message(code: &str, ttl_minutes: i64) -> (String, String) {
    let subject = format!("Your sign-in code: {code}");
    let body = format!(
        "Your verification code is {code}.\n\n\
         It expires in {ttl_minutes} minutes. If you didn't request it, you can ignore this email.\n"
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_mailer_without_smtp_host() {
        let config = Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("JWT_SECRET", "secret"),
        ])
        .unwrap();
        assert!(Mailer::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn otp_message_mentions_code_and_expiry() {
        let (subject, body) = otp_message("123456", 10);
        assert!(subject.contains("123456"));
        assert!(body.contains("123456"));
        assert!(body.contains("10 minutes"));
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}

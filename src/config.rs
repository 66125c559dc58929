//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.
//!
//! Every external integration (SMTP, object storage, payment processor, generation
//! provider, Google OAuth) is optional. Leaving its variables unset disables the
//! features that depend on it instead of preventing startup.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `JWT_SECRET` (required): HMAC secret used to sign session tokens
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `SITE_URL` (optional): public origin used for redirects and callback URLs
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_site_url")]
    pub site_url: String,

    // Sessions
    pub jwt_secret: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    // Email OTP
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: i32,
    #[serde(default = "default_otp_resend_cooldown_seconds")]
    pub otp_resend_cooldown_seconds: i64,
    #[serde(default = "default_signup_bonus_credits")]
    pub signup_bonus_credits: i64,

    // SMTP
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,

    // Object storage
    pub storage_url: Option<String>,
    pub storage_service_key: Option<String>,
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    // Payment processor
    pub payment_api_key: Option<String>,
    pub payment_webhook_secret: Option<String>,
    #[serde(default = "default_payment_api_base")]
    pub payment_api_base: String,
    pub payment_price_basic: Option<String>,
    pub payment_price_pro: Option<String>,
    pub payment_price_max: Option<String>,

    // Generation provider
    #[serde(default)]
    pub generation_enabled: bool,
    pub generation_api_url: Option<String>,
    pub generation_api_key: Option<String>,
    pub generation_webhook_secret: Option<String>,

    // Google OAuth
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
}

fn default_database_max_connections() -> u32 {
    10
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

/// One week.
fn default_session_ttl_hours() -> i64 {
    168
}

fn default_otp_ttl_minutes() -> i64 {
    10
}

fn default_otp_max_attempts() -> i32 {
    5
}

fn default_otp_resend_cooldown_seconds() -> i64 {
    60
}

fn default_signup_bonus_credits() -> i64 {
    20
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "no-reply@localhost".to_string()
}

fn default_storage_bucket() -> String {
    "uploads".to_string()
}

fn default_payment_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Build a configuration from explicit key/value pairs instead of the process
    /// environment. Keys use the same upper-case names as the environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))
    }

    /// Site origin without a trailing slash.
    pub fn site_origin(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    /// Session cookies are only marked `Secure` when the site is served over HTTPS.
    pub fn secure_cookies(&self) -> bool {
        self.site_url.starts_with("https://")
    }
}

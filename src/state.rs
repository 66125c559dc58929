//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::generation_provider::GenerationClient;
use crate::services::mailer::Mailer;
use crate::services::oauth::GoogleOAuth;
use crate::services::payment_client::PaymentClient;
use crate::services::storage::StorageClient;

/// Outbound HTTP calls give up after this long.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a request needs. Cheap to clone: the pool and clients are
/// reference-counted internally.
///
/// Each external client is `None` when its configuration is missing; handlers
/// turn that into `AppError::FeatureDisabled`.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub mailer: Option<Mailer>,
    pub storage: Option<StorageClient>,
    pub payments: Option<PaymentClient>,
    pub generation: Option<GenerationClient>,
    pub google: Option<GoogleOAuth>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let mailer = Mailer::from_config(&config)?;
        if mailer.is_none() {
            tracing::warn!("SMTP_HOST not set; email sign-in is disabled");
        }

        let storage = StorageClient::from_config(&config, http.clone());
        let payments = PaymentClient::from_config(&config, http.clone());
        let generation = GenerationClient::from_config(&config, http.clone());
        if generation.is_none() {
            tracing::info!("Generation provider disabled");
        }
        let google = GoogleOAuth::from_config(&config, http);

        Ok(Self {
            pool,
            config: Arc::new(config),
            mailer,
            storage,
            payments,
            generation,
            google,
        })
    }
}

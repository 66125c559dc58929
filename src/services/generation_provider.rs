//! Client for the AI generation provider.
//!
//! The provider exposes a small JSON API:
//! - `POST {base}/v1/generations` submits a job and returns its id
//! - `GET {base}/v1/generations/{id}` returns current status and outputs
//! - it calls back `POST /api/v1/webhooks/generation` when a job finishes
//!
//! The client only exists when `GENERATION_ENABLED=true` and the provider URL and
//! key are configured.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::models::job::{Job, JobStatus};

#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    callback_url: String,
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    kind: &'a str,
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<i32>,
    num_outputs: i32,
    inputs: &'a serde_json::Value,
    webhook_url: &'a str,
    /// Echoed back in callbacks
    reference: String,
}

/// Job state as reported by the provider, either polled or pushed.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderJob {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A status change to apply to a stored job.
#[derive(Debug, Clone)]
pub struct ProviderUpdate {
    pub status: JobStatus,
    pub output_urls: Vec<String>,
    pub error: Option<String>,
}

impl From<ProviderJob> for ProviderUpdate {
    fn from(job: ProviderJob) -> Self {
        Self {
            status: map_provider_status(&job.status),
            output_urls: job.outputs,
            error: job.error,
        }
    }
}

/// Normalize provider status vocabulary. Unknown values count as in progress.
pub fn map_provider_status(status: &str) -> JobStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "queued" | "starting" | "pending" => JobStatus::Pending,
        "processing" | "running" | "in_progress" => JobStatus::Processing,
        "succeeded" | "completed" | "success" => JobStatus::Succeeded,
        "failed" | "error" => JobStatus::Failed,
        "canceled" | "cancelled" => JobStatus::Canceled,
        _ => JobStatus::Processing,
    }
}

impl GenerationClient {
    pub fn from_config(config: &Config, http: reqwest::Client) -> Option<Self> {
        if !config.generation_enabled {
            return None;
        }
        let base_url = config
            .generation_api_url
            .as_deref()?
            .trim_end_matches('/')
            .to_string();
        let api_key = config.generation_api_key.clone()?;
        Some(Self {
            http,
            base_url,
            api_key,
            callback_url: format!("{}/api/v1/webhooks/generation", config.site_origin()),
        })
    }

    /// Submit a stored job and return the provider's id for it.
    pub async fn submit(&self, job: &Job) -> Result<String, AppError> {
        let body = SubmitBody {
            kind: &job.kind,
            model: &job.model,
            prompt: &job.prompt,
            aspect_ratio: job.aspect_ratio.as_deref(),
            duration: job.duration_seconds,
            num_outputs: job.num_outputs,
            inputs: &job.input,
            webhook_url: &self.callback_url,
            reference: job.id.to_string(),
        };

        let response = self
            .http
            .post(format!("{}/v1/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("provider submit failed: {e}")))?;

        let accepted: ProviderJob = read_json(response).await?;
        Ok(accepted.id)
    }

    pub async fn fetch(&self, provider_job_id: &str) -> Result<ProviderJob, AppError> {
        let response = self
            .http
            .get(format!(
                "{}/v1/generations/{}",
                self.base_url, provider_job_id
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("provider status failed: {e}")))?;

        read_json(response).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream(format!(
            "provider responded {status}: {body}"
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Upstream(format!("provider returned invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let mut all = vec![
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("JWT_SECRET", "secret"),
        ];
        all.extend_from_slice(pairs);
        Config::from_pairs(all).unwrap()
    }

    #[test]
    fn status_vocabulary_is_normalized() {
        assert_eq!(map_provider_status("queued"), JobStatus::Pending);
        assert_eq!(map_provider_status("RUNNING"), JobStatus::Processing);
        assert_eq!(map_provider_status("completed"), JobStatus::Succeeded);
        assert_eq!(map_provider_status("error"), JobStatus::Failed);
        assert_eq!(map_provider_status("cancelled"), JobStatus::Canceled);
        assert_eq!(map_provider_status("warming_up"), JobStatus::Processing);
    }

    #[test]
    fn disabled_unless_flag_and_credentials() {
        let creds = [
            ("GENERATION_API_URL", "https://gen.example.com/"),
            ("GENERATION_API_KEY", "k"),
        ];
        assert!(GenerationClient::from_config(&config(&creds), reqwest::Client::new()).is_none());

        let mut enabled = creds.to_vec();
        enabled.push(("GENERATION_ENABLED", "true"));
        let client =
            GenerationClient::from_config(&config(&enabled), reqwest::Client::new()).unwrap();
        assert_eq!(client.base_url, "https://gen.example.com");
        assert_eq!(
            client.callback_url,
            "http://localhost:3000/api/v1/webhooks/generation"
        );

        let no_key = [
            ("GENERATION_ENABLED", "true"),
            ("GENERATION_API_URL", "https://gen.example.com"),
        ];
        assert!(GenerationClient::from_config(&config(&no_key), reqwest::Client::new()).is_none());
    }

    #[test]
    fn callback_payload_parses_with_defaults() {
        let job: ProviderJob =
            serde_json::from_str(r#"{"id":"gen_1","status":"processing"}"#).unwrap();
        let update = ProviderUpdate::from(job);
        assert_eq!(update.status, JobStatus::Processing);
        assert!(update.output_urls.is_empty());
        assert!(update.error.is_none());
    }
}

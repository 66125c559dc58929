//! Object storage uploads.
//!
//! Files are written with `PUT {STORAGE_URL}/object/{bucket}/{path}` and a bearer
//! service key, and served from `{STORAGE_URL}/object/public/{bucket}/{path}`.
//! Validation of what may be uploaded also lives here.

use crate::config::Config;
use crate::error::AppError;

const MIB: usize = 1024 * 1024;

pub const MAX_IMAGE_BYTES: usize = 10 * MIB;
pub const MAX_VIDEO_BYTES: usize = 100 * MIB;
pub const MAX_AUDIO_BYTES: usize = 20 * MIB;

/// Content types accepted by the upload endpoint, with their file extension and size cap.
const ALLOWED_TYPES: [(&str, &str, usize); 11] = [
    ("image/png", "png", MAX_IMAGE_BYTES),
    ("image/jpeg", "jpg", MAX_IMAGE_BYTES),
    ("image/webp", "webp", MAX_IMAGE_BYTES),
    ("image/gif", "gif", MAX_IMAGE_BYTES),
    ("video/mp4", "mp4", MAX_VIDEO_BYTES),
    ("video/quicktime", "mov", MAX_VIDEO_BYTES),
    ("video/webm", "webm", MAX_VIDEO_BYTES),
    ("audio/mpeg", "mp3", MAX_AUDIO_BYTES),
    ("audio/wav", "wav", MAX_AUDIO_BYTES),
    ("audio/x-wav", "wav", MAX_AUDIO_BYTES),
    ("audio/mp4", "m4a", MAX_AUDIO_BYTES),
];

/// Largest body the upload route accepts before multipart parsing.
pub const MAX_UPLOAD_BODY_BYTES: usize = MAX_VIDEO_BYTES + MIB;

/// Check type and size, returning the extension to store the file under.
pub fn validate_upload(content_type: &str, size: usize) -> Result<&'static str, AppError> {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let &(_, ext, max) = ALLOWED_TYPES
        .iter()
        .find(|(t, _, _)| *t == content_type)
        .ok_or_else(|| {
            AppError::InvalidRequest(format!("File type {content_type} is not supported"))
        })?;

    if size == 0 {
        return Err(AppError::InvalidRequest("File is empty".to_string()));
    }
    if size > max {
        return Err(AppError::InvalidRequest(format!(
            "File is too large (max {} MB)",
            max / MIB
        )));
    }
    Ok(ext)
}

#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl StorageClient {
    pub fn from_config(config: &Config, http: reqwest::Client) -> Option<Self> {
        let base_url = config.storage_url.as_deref()?.trim_end_matches('/').to_string();
        let service_key = config.storage_service_key.clone()?;
        Some(Self {
            http,
            base_url,
            service_key,
            bucket: config.storage_bucket.clone(),
        })
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, self.bucket, path)
    }

    /// Upload `bytes` to `path` inside the bucket and return its public URL.
    pub async fn put_object(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("storage request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "storage responded {status}: {body}"
            )));
        }

        Ok(self.public_url(path))
    }
}

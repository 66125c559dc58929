//! File upload endpoint.

use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    response::ApiResponse,
    services::storage,
    state::AppState,
};

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Object key inside the bucket: `<user_id>/<uuid>.<ext>`
    pub path: String,
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

/// Upload one file for use as a job input.
///
/// # Endpoint
///
/// `POST /api/v1/uploads` with a `multipart/form-data` body carrying a `file`
/// field. Other fields are ignored.
///
/// # Response
///
/// - **Success (201 Created)**: `{ path, url, content_type, size }`
/// - **Error (400)**: Missing file, empty file, unsupported type or too large
/// - **Error (502)**: Storage rejected the upload
/// - **Error (503)**: Storage is not configured
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadResponse>>), AppError> {
    let storage = state.storage.as_ref().ok_or(AppError::FeatureDisabled)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Failed to read upload: {e}")))?;

        let ext = storage::validate_upload(&content_type, data.len())?;
        let path = format!("{}/{}.{}", auth.user_id, Uuid::new_v4(), ext);
        let size = data.len();

        let url = storage
            .put_object(&path, &content_type, data.to_vec())
            .await?;

        tracing::info!(user_id = %auth.user_id, %path, size, "File uploaded");

        return Ok((
            StatusCode::CREATED,
            ApiResponse::ok(UploadResponse {
                path,
                url,
                content_type,
                size,
            }),
        ));
    }

    Err(AppError::InvalidRequest(
        "Missing multipart field \"file\"".to_string(),
    ))
}

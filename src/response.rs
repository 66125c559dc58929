//! Success envelope shared by every JSON endpoint.
//!
//! Errors are rendered by [`crate::error::AppError`] with `success: false`.

use axum::Json;
use serde::Serialize;

/// `{ "success": true, "data": T }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Query parameters for paginated list endpoints.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

const MAX_LIMIT: i64 = 100;

fn default_limit() -> i64 {
    20
}

impl Pagination {
    /// Clamp client-supplied values into a safe range.
    pub fn normalized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }
}

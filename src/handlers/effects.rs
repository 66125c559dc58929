//! Effect template catalogue.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    error::AppError,
    models::effect::{EffectTemplate, EffectsQuery},
    response::ApiResponse,
    state::AppState,
};

/// `GET /api/v1/effects?kind=image`
///
/// Public. Active templates in display order.
pub async fn list_effects(
    State(state): State<AppState>,
    Query(query): Query<EffectsQuery>,
) -> Result<Json<ApiResponse<Vec<EffectTemplate>>>, AppError> {
    let effects = sqlx::query_as::<_, EffectTemplate>(
        r#"
        SELECT * FROM effect_templates
        WHERE is_active = true AND ($1::text IS NULL OR kind = $1)
        ORDER BY sort_order, name
        "#,
    )
    .bind(query.kind.as_deref())
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::ok(effects))
}

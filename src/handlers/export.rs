use axum::{
    extract::{Query, State},
    Extension,
};

use super::students::StudentQuery;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ExportBundle;

/// GET /api/export/students - Full aggregate views for the filtered set
///
/// Uses the list filters; `limit` above the configured cap (or not
/// positive) falls back to the default export size. `offset` is ignored.
pub async fn export_students(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<StudentQuery>,
) -> ApiResult<ExportBundle> {
    let limits = &state.config.import;
    let bundle = state
        .service
        .collect_export(
            query.filters(),
            query.limit,
            limits.export_default_limit,
            limits.export_max_limit,
            user.scope,
        )
        .await?;
    Ok(ApiResponse::success(bundle))
}

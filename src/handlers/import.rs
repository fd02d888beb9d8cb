use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::import::{parse_import_workbook, ImportContact, ImportOptions, ImportReport, ImportStudent};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportRequest {
    pub rows: Vec<ImportStudent>,
    pub contacts: Vec<ImportContact>,
    pub replace_contacts: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub replace_contacts: Option<bool>,
}

/// POST /api/import/students - Reconcile already-decoded rows
pub async fn import_json(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<ImportReport> {
    let options = ImportOptions {
        replace_contacts: request
            .replace_contacts
            .unwrap_or(state.config.import.default_replace_contacts),
        scope: user.scope,
    };

    let results = state
        .reconciler
        .reconcile_with(&request.rows, &request.contacts, user.user_id, &options)
        .await;
    Ok(ApiResponse::success(ImportReport::from(results)))
}

/// POST /api/import/students.xlsx - Multipart upload, field `file`
pub async fn import_xlsx(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ImportQuery>,
    mut multipart: Multipart,
) -> ApiResult<ImportReport> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            upload = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }

    let bytes = upload
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::bad_request("file is required"))?;
    tracing::info!(user_id = user.user_id, size = bytes.len(), "received import workbook");

    let decoded = tokio::task::spawn_blocking(move || parse_import_workbook(&bytes))
        .await
        .map_err(|e| ApiError::internal_server_error(format!("workbook decoding aborted: {}", e)))??;

    let options = ImportOptions {
        replace_contacts: query
            .replace_contacts
            .unwrap_or(state.config.import.default_replace_contacts),
        scope: user.scope,
    };

    let results = state
        .reconciler
        .reconcile_with(&decoded.rows, &decoded.contacts, user.user_id, &options)
        .await;
    Ok(ApiResponse::success(ImportReport::from(results)))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::NewContact;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ConsentsInput, DocumentsInput, MedicalInput};

/// PUT /api/students/:id/documents
pub async fn put_documents(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<DocumentsInput>,
) -> ApiResult<Value> {
    state.service.upsert_documents(id, input, user.scope).await?;
    Ok(ApiResponse::success(json!({ "student_id": id })))
}

/// PUT /api/students/:id/medical
pub async fn put_medical(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<MedicalInput>,
) -> ApiResult<Value> {
    state.service.upsert_medical(id, input, user.scope).await?;
    Ok(ApiResponse::success(json!({ "student_id": id })))
}

/// PUT /api/students/:id/consents
pub async fn put_consents(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<ConsentsInput>,
) -> ApiResult<Value> {
    state.service.upsert_consents(id, input, user.scope).await?;
    Ok(ApiResponse::success(json!({ "student_id": id })))
}

/// POST /api/students/:id/contacts
pub async fn add_contact(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(contact): Json<NewContact>,
) -> ApiResult<Value> {
    let contact_id = state.service.add_contact(id, &contact, user.scope).await?;
    Ok(ApiResponse::created(json!({ "id": contact_id, "student_id": id })))
}

/// DELETE /api/contacts/:id
pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    state.service.delete_contact(id, user.scope).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::{StudentCoreInput, StudentFilters, StudentPage, StudentView};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::StudentStatus;

/// Query string shared by list and export.
#[derive(Debug, Default, Deserialize)]
pub struct StudentQuery {
    pub q: Option<String>,
    pub school_id: Option<i64>,
    pub class_label: Option<String>,
    pub status: Option<StudentStatus>,
    pub admission_year_from: Option<i32>,
    pub admission_year_to: Option<i32>,
    pub birth_date_from: Option<NaiveDate>,
    pub birth_date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl StudentQuery {
    pub fn filters(&self) -> StudentFilters {
        StudentFilters {
            q: self.q.clone(),
            school_id: self.school_id,
            class_label: self.class_label.clone(),
            status: self.status,
            admission_year_from: self.admission_year_from,
            admission_year_to: self.admission_year_to,
            birth_date_from: self.birth_date_from,
            birth_date_to: self.birth_date_to,
        }
    }
}

/// GET /api/students - Filtered, paged student list
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<StudentQuery>,
) -> ApiResult<StudentPage> {
    let page = state
        .service
        .list(query.filters(), query.limit, query.offset, user.scope)
        .await?;
    Ok(ApiResponse::success(page))
}

/// POST /api/students - Create a core record
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<StudentCoreInput>,
) -> ApiResult<Value> {
    let id = state.service.create_core(&input, user.scope, user.user_id).await?;
    Ok(ApiResponse::created(json!({ "id": id })))
}

/// GET /api/students/:id - Core plus every sub-record
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<StudentView> {
    let view = state.service.aggregate_view(id, user.scope).await?;
    Ok(ApiResponse::success(view))
}

/// PUT|PATCH /api/students/:id - Replace the core fields
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<StudentCoreInput>,
) -> ApiResult<Value> {
    state.service.update_core(id, &input, user.scope, user.user_id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "updated": true })))
}

/// DELETE /api/students/:id - Soft delete
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    state.service.delete_core(id, user.scope, user.user_id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

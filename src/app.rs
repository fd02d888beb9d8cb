use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::StudentStore;
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::services::import::Reconciler;
use crate::services::StudentService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: StudentService,
    pub reconciler: Reconciler,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn StudentStore>, config: AppConfig) -> Self {
        Self {
            service: StudentService::new(Arc::clone(&store)),
            reconciler: Reconciler::new(store),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(student_routes())
        .merge(import_routes(state.config.api.max_upload_bytes))
        .merge(export_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Protected API
        .merge(protected);

    if state.config.security.enable_cors {
        app = app.layer(cors_layer(&state.config.security));
    }
    if state.config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn student_routes() -> Router<AppState> {
    use handlers::{records, students};

    Router::new()
        .route("/api/students", get(students::list).post(students::create))
        .route(
            "/api/students/:id",
            get(students::show)
                .put(students::update)
                .patch(students::update)
                .delete(students::remove),
        )
        // Sub-records
        .route("/api/students/:id/documents", put(records::put_documents))
        .route("/api/students/:id/medical", put(records::put_medical))
        .route("/api/students/:id/consents", put(records::put_consents))
        .route("/api/students/:id/contacts", post(records::add_contact))
        .route("/api/contacts/:id", delete(records::delete_contact))
}

fn import_routes(max_upload_bytes: usize) -> Router<AppState> {
    use handlers::import;

    Router::new()
        .route("/api/import/students", post(import::import_json))
        .route(
            "/api/import/students.xlsx",
            post(import::import_xlsx).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

fn export_routes() -> Router<AppState> {
    Router::new().route("/api/export/students", get(handlers::export::export_students))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "eduBase API",
            "version": version,
            "description": "School student registry with bulk spreadsheet import",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "students": "/api/students[/:id] (protected)",
                "records": "/api/students/:id/{documents,medical,consents,contacts} (protected)",
                "contacts": "/api/contacts/:id (protected)",
                "import": "/api/import/students, /api/import/students.xlsx (protected)",
                "export": "/api/export/students (protected)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.service.store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

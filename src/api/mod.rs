//! REST surface. A thin axum layer over the same lifecycle engine and query
//! pipeline the first-party UI calls, with bearer-key authentication and an
//! open CORS policy.

pub mod handlers;

use crate::auth::AuthService;
use crate::errors::AppError;
use crate::tasks::TaskService;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskService>,
    pub auth: Arc<AuthService>,
}

/// Errors cross the HTTP boundary as `{"error": <short message>}` with the
/// documented status; internal detail is logged, never returned.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(message) => (StatusCode::UNAUTHORIZED, message.clone()),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Io(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/api/tasks",
            get(handlers::list_tasks)
                .post(handlers::create_task)
                .options(handlers::preflight),
        )
        .route(
            "/api/task",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task)
                .options(handlers::preflight),
        )
        .route("/health", get(handlers::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn bearer_header(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value: &HeaderValue| value.to_str().ok())
}

use crate::api::{bearer_header, AppState};
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateTaskPayload, TaskListResponse, TaskRecord, TaskStatus, TaskView, UpdateTaskPayload,
};
use crate::query::ListOptions;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub quadrant: Option<String>,
    pub q: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    // Kept as raw strings: an unparsable limit falls back to the default
    // page size instead of rejecting the request.
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskParams {
    pub id: Option<String>,
    pub permanent: Option<String>,
}

impl TaskParams {
    fn require_id(&self) -> AppResult<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Validation("Task ID is required. Use ?id=taskId".to_string()))
    }

    fn permanent(&self) -> bool {
        self.permanent.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTaskResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub important: bool,
    pub urgent: bool,
    pub done: bool,
    pub status: TaskStatus,
}

impl From<TaskRecord> for CreatedTaskResponse {
    fn from(task: TaskRecord) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            important: task.important,
            urgent: task.urgent,
            done: task.done,
            status: task.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteTaskResponse {
    pub message: &'static str,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<TaskListResponse>, AppError> {
    let user = state.auth.authenticate(bearer_header(&headers))?;
    let options = ListOptions::from_raw(
        params.status.as_deref(),
        params.quadrant.as_deref(),
        params.q.as_deref(),
        params.order_by.as_deref(),
        params.order_dir.as_deref(),
        params.limit.as_deref(),
        params.offset.as_deref(),
    );
    state.tasks.list(&user, &options).map(Json)
}

/// GET /api/task?id=<id>
pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TaskParams>,
) -> Result<Json<TaskView>, AppError> {
    let user = state.auth.authenticate(bearer_header(&headers))?;
    let task_id = params.require_id()?;
    state.tasks.get(&user, task_id).map(|task| Json(TaskView::from(task)))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<(StatusCode, Json<CreatedTaskResponse>), AppError> {
    let user = state.auth.authenticate(bearer_header(&headers))?;
    let task = state.tasks.create(&user, payload)?;
    Ok((StatusCode::CREATED, Json(CreatedTaskResponse::from(task))))
}

/// PUT /api/task?id=<id>
pub async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TaskParams>,
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<TaskView>, AppError> {
    let user = state.auth.authenticate(bearer_header(&headers))?;
    let task_id = params.require_id()?;
    state
        .tasks
        .update(&user, task_id, payload)
        .map(|task| Json(TaskView::from(task)))
}

/// DELETE /api/task?id=<id>[&permanent=true]
pub async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TaskParams>,
) -> Result<Json<DeleteTaskResponse>, AppError> {
    let user = state.auth.authenticate(bearer_header(&headers))?;
    let task_id = params.require_id()?.to_string();

    let message = if params.permanent() {
        state.tasks.purge(&user, &task_id)?;
        "Task permanently deleted"
    } else {
        state.tasks.delete(&user, &task_id)?;
        "Task moved to trash"
    };

    Ok(Json(DeleteTaskResponse {
        message,
        id: task_id,
    }))
}

/// Plain OPTIONS on the API routes; actual CORS preflight is answered by the
/// CorsLayer before it gets here.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

//! Task lifecycle engine. Owns the state machine for a single task and the
//! field rules around it; every operation takes the caller's identity
//! explicitly and treats a task that is missing or owned by someone else as
//! not found, so existence is never confirmed to non-owners.

use crate::db::{Database, TaskPatch};
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateTaskPayload, Priority, ReorderUpdate, TaskListResponse, TaskRecord, TaskStatus,
    TaskView, TrashedTaskView, UpdateTaskPayload, UserId,
};
use crate::query::{self, ListOptions};
use crate::retention::RetentionPolicy;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct TaskService {
    db: Arc<Database>,
    retention: RetentionPolicy,
}

impl TaskService {
    pub fn new(db: Arc<Database>, retention: RetentionPolicy) -> Self {
        Self { db, retention }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Fetches an owned task. Missing and not-owned collapse into the same
    /// `NotFound`.
    pub fn get(&self, user: &UserId, task_id: &str) -> AppResult<TaskRecord> {
        match self.db.get_task(task_id)? {
            Some(task) if task.user_id == *user => Ok(task),
            _ => Err(AppError::NotFound("Task not found".to_string())),
        }
    }

    pub fn create(&self, user: &UserId, payload: CreateTaskPayload) -> AppResult<TaskRecord> {
        let title = payload.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let now = Utc::now();
        let task = TaskRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.clone(),
            title,
            description: payload
                .description
                .map(|text| text.trim().to_string())
                .unwrap_or_default(),
            due_date: payload.due_date.unwrap_or_default(),
            priority: payload
                .priority
                .as_deref()
                .and_then(Priority::parse)
                .unwrap_or(Priority::Medium),
            important: payload.important,
            urgent: payload.urgent,
            done: false,
            status: TaskStatus::Active,
            sort_order: Some(now.timestamp_millis() as f64),
            created_at: now,
            archived_at: None,
            deleted_at: None,
        };

        self.db.insert_task(&task)?;
        tracing::debug!(task_id = %task.id, user = %user, "task created");
        Ok(task)
    }

    /// Permissive partial merge: present fields are applied, unrecognized
    /// `priority`/`status` strings are dropped without failing the rest of
    /// the patch. Returns the merged task.
    pub fn update(
        &self,
        user: &UserId,
        task_id: &str,
        payload: UpdateTaskPayload,
    ) -> AppResult<TaskRecord> {
        self.get(user, task_id)?;

        let mut patch = TaskPatch {
            title: payload.title.map(|text| text.trim().to_string()),
            description: payload.description.map(|text| text.trim().to_string()),
            due_date: payload.due_date,
            priority: payload.priority.as_deref().and_then(Priority::parse),
            important: payload.important,
            urgent: payload.urgent,
            done: payload.done,
            status: payload.status.as_deref().and_then(TaskStatus::parse),
            sort_order: payload.sort_order,
            archived_at: None,
            deleted_at: None,
        };

        // A status change through the generic patch keeps the timestamp
        // invariant intact.
        if let Some(status) = patch.status {
            let now = Utc::now();
            match status {
                TaskStatus::Active => {
                    patch.archived_at = Some(None);
                    patch.deleted_at = Some(None);
                }
                TaskStatus::Archived => patch.archived_at = Some(Some(now)),
                TaskStatus::Deleted => patch.deleted_at = Some(Some(now)),
            }
        }

        self.db.patch_task(task_id, &patch)?;
        self.get(user, task_id)
    }

    pub fn archive(&self, user: &UserId, task_id: &str) -> AppResult<TaskRecord> {
        self.get(user, task_id)?;
        self.db.patch_task(
            task_id,
            &TaskPatch {
                status: Some(TaskStatus::Archived),
                archived_at: Some(Some(Utc::now())),
                ..TaskPatch::default()
            },
        )?;
        self.get(user, task_id)
    }

    /// Soft delete: flips status and stamps `deletedAt`; the row survives
    /// until the retention sweeper, `purge`, or `empty_trash` removes it.
    pub fn delete(&self, user: &UserId, task_id: &str) -> AppResult<TaskRecord> {
        self.get(user, task_id)?;
        self.db.patch_task(
            task_id,
            &TaskPatch {
                status: Some(TaskStatus::Deleted),
                deleted_at: Some(Some(Utc::now())),
                ..TaskPatch::default()
            },
        )?;
        self.get(user, task_id)
    }

    /// Back to active from any prior state, clearing both transition stamps.
    pub fn restore(&self, user: &UserId, task_id: &str) -> AppResult<TaskRecord> {
        self.get(user, task_id)?;
        self.db.patch_task(
            task_id,
            &TaskPatch {
                status: Some(TaskStatus::Active),
                archived_at: Some(None),
                deleted_at: Some(None),
                ..TaskPatch::default()
            },
        )?;
        self.get(user, task_id)
    }

    /// Unconditional hard delete.
    pub fn purge(&self, user: &UserId, task_id: &str) -> AppResult<()> {
        self.get(user, task_id)?;
        self.db.delete_task(task_id)?;
        Ok(())
    }

    /// Purges every owned trashed task, ignoring the retention window:
    /// emptying the trash is explicit intent. Best-effort per row; returns
    /// the purge count.
    pub fn empty_trash(&self, user: &UserId) -> AppResult<usize> {
        let trashed = self.db.tasks_by_user_and_status(user, TaskStatus::Deleted)?;
        let mut purged = 0usize;
        for task in trashed {
            match self.db.delete_task(&task.id) {
                Ok(true) => purged += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(task_id = %task.id, %error, "failed to purge trashed task");
                }
            }
        }
        Ok(purged)
    }

    /// Batch of independent per-task position patches; entries pointing at
    /// missing or foreign tasks are skipped, so a batch can partially
    /// succeed. Returns how many entries were applied.
    pub fn reorder(&self, user: &UserId, updates: Vec<ReorderUpdate>) -> AppResult<usize> {
        let mut applied = 0usize;
        for update in updates {
            match self.db.get_task(&update.task_id)? {
                Some(task) if task.user_id == *user => {}
                _ => continue,
            }

            let patch = TaskPatch {
                sort_order: Some(update.sort_order),
                important: update.important,
                urgent: update.urgent,
                ..TaskPatch::default()
            };
            if self.db.patch_task(&update.task_id, &patch)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// The list pipeline behind both front doors.
    pub fn list(&self, user: &UserId, options: &ListOptions) -> AppResult<TaskListResponse> {
        let snapshot = match options.status {
            Some(filter) => self.db.tasks_by_user_and_status(user, filter.stored_status())?,
            None => Vec::new(),
        };
        Ok(query::run(snapshot, options, self.retention, Utc::now()))
    }

    /// Board view for the first-party UI: active tasks in manual order
    /// (`sortOrder` ascending, legacy rows falling back to creation time).
    pub fn board(&self, user: &UserId) -> AppResult<Vec<TaskView>> {
        let mut tasks = self.db.tasks_by_user_and_status(user, TaskStatus::Active)?;
        tasks.sort_by(|a, b| {
            a.effective_sort_order()
                .partial_cmp(&b.effective_sort_order())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(tasks.into_iter().map(TaskView::from).collect())
    }

    pub fn archived(&self, user: &UserId) -> AppResult<Vec<TaskView>> {
        let tasks = self.db.tasks_by_user_and_status(user, TaskStatus::Archived)?;
        Ok(tasks.into_iter().map(TaskView::from).collect())
    }

    /// Trash view with the retention filter applied and a days-remaining
    /// counter attached to each entry.
    pub fn trash(&self, user: &UserId) -> AppResult<Vec<TrashedTaskView>> {
        let now = Utc::now();
        let tasks = self.db.tasks_by_user_and_status(user, TaskStatus::Deleted)?;
        Ok(tasks
            .into_iter()
            .filter(|task| !self.retention.is_expired(task.deleted_at, now))
            .map(|task| TrashedTaskView {
                days_left: self.retention.days_left(task.deleted_at, now),
                view: TaskView::from(task),
            })
            .collect())
    }
}

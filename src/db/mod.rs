use crate::errors::{AppError, AppResult};
use crate::models::{
    ApiKeyRecord, FeedbackPayload, Priority, TaskRecord, TaskStatus, UserId, UserProfile,
    UserRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const TASK_COLUMNS: &str = "id, user_id, title, description, due_date, priority, important, \
     urgent, done, status, sort_order, created_at, archived_at, deleted_at";

/// Store-level partial update of a single task row. Only columns that are
/// `Some` are written; the outer `Option` on the timestamp columns
/// distinguishes "leave alone" from "set to NULL".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
    pub important: Option<bool>,
    pub urgent: Option<bool>,
    pub done: Option<bool>,
    pub status: Option<TaskStatus>,
    pub sort_order: Option<f64>,
    pub archived_at: Option<Option<DateTime<Utc>>>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.important.is_none()
            && self.urgent.is_none()
            && self.done.is_none()
            && self.status.is_none()
            && self.sort_order.is_none()
            && self.archived_at.is_none()
            && self.deleted_at.is_none()
    }
}

/// Document-style access to the record store. Deliberately thin: get by id,
/// insert, column patch, delete, and indexed equality scans. Filtering,
/// sorting, and pagination all happen above this layer.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    // ─── Tasks ──────────────────────────────────────────────────────────────

    pub fn insert_task(&self, task: &TaskRecord) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (
               id, user_id, title, description, due_date, priority, important,
               urgent, done, status, sort_order, created_at, archived_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                task.id,
                task.user_id.as_str(),
                task.title,
                task.description,
                task.due_date,
                task.priority.as_str(),
                task.important,
                task.urgent,
                task.done,
                task.status.as_str(),
                task.sort_order,
                task.created_at.to_rfc3339(),
                task.archived_at.map(|ts| ts.to_rfc3339()),
                task.deleted_at.map(|ts| ts.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, task_id: &str) -> AppResult<Option<TaskRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            [task_id],
            parse_task_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn patch_task(&self, task_id: &str, patch: &TaskPatch) -> AppResult<bool> {
        if patch.is_empty() {
            return Ok(self.get_task(task_id)?.is_some());
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(title) = &patch.title {
            sets.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(description) = &patch.description {
            sets.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(due_date) = &patch.due_date {
            sets.push("due_date = ?");
            values.push(Box::new(due_date.clone()));
        }
        if let Some(priority) = patch.priority {
            sets.push("priority = ?");
            values.push(Box::new(priority.as_str().to_string()));
        }
        if let Some(important) = patch.important {
            sets.push("important = ?");
            values.push(Box::new(important));
        }
        if let Some(urgent) = patch.urgent {
            sets.push("urgent = ?");
            values.push(Box::new(urgent));
        }
        if let Some(done) = patch.done {
            sets.push("done = ?");
            values.push(Box::new(done));
        }
        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(sort_order) = patch.sort_order {
            sets.push("sort_order = ?");
            values.push(Box::new(sort_order));
        }
        if let Some(archived_at) = &patch.archived_at {
            sets.push("archived_at = ?");
            values.push(Box::new(archived_at.map(|ts| ts.to_rfc3339())));
        }
        if let Some(deleted_at) = &patch.deleted_at {
            sets.push("deleted_at = ?");
            values.push(Box::new(deleted_at.map(|ts| ts.to_rfc3339())));
        }

        values.push(Box::new(task_id.to_string()));
        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));

        let conn = self.lock()?;
        let affected = conn.execute(
            &sql,
            rusqlite::params_from_iter(values.iter().map(|value| value.as_ref())),
        )?;
        Ok(affected > 0)
    }

    pub fn delete_task(&self, task_id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
        Ok(affected > 0)
    }

    /// Indexed equality scan on `(user_id, status)`.
    pub fn tasks_by_user_and_status(
        &self,
        user: &UserId,
        status: TaskStatus,
    ) -> AppResult<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND status = ?2"
        ))?;
        let rows = statement.query_map(params![user.as_str(), status.as_str()], parse_task_row)?;
        collect_rows(rows)
    }

    /// Indexed equality scan on `user_id` alone.
    pub fn tasks_by_user(&self, user: &UserId) -> AppResult<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut statement =
            conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1"))?;
        let rows = statement.query_map([user.as_str()], parse_task_row)?;
        collect_rows(rows)
    }

    /// All trashed rows regardless of owner. Used by the retention sweeper,
    /// which applies the cutoff itself and deletes row by row.
    pub fn tasks_by_status(&self, status: TaskStatus) -> AppResult<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut statement =
            conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1"))?;
        let rows = statement.query_map([status.as_str()], parse_task_row)?;
        collect_rows(rows)
    }

    // ─── Users ──────────────────────────────────────────────────────────────

    pub fn upsert_user(&self, subject: &str, profile: &UserProfile) -> AppResult<UserRecord> {
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO users (id, subject, email, name, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(subject) DO UPDATE SET
                   email = excluded.email,
                   name = excluded.name,
                   avatar_url = excluded.avatar_url",
                params![
                    Uuid::new_v4().to_string(),
                    subject,
                    profile.email,
                    profile.name,
                    profile.avatar_url,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        self.user_by_subject(subject)?
            .ok_or_else(|| AppError::Internal("user upsert did not persist".to_string()))
    }

    pub fn user_by_subject(&self, subject: &str) -> AppResult<Option<UserRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, subject, email, name, avatar_url, created_at
             FROM users WHERE subject = ?1",
            [subject],
            parse_user_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn delete_user(&self, user: &UserId) -> AppResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", [user.as_str()])?;
        Ok(affected > 0)
    }

    // ─── API keys ───────────────────────────────────────────────────────────

    pub fn api_key_by_user(&self, user: &UserId) -> AppResult<Option<ApiKeyRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, user_id, key, created_at FROM api_keys WHERE user_id = ?1",
            [user.as_str()],
            parse_api_key_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn api_key_by_key(&self, key: &str) -> AppResult<Option<ApiKeyRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, user_id, key, created_at FROM api_keys WHERE key = ?1",
            [key],
            parse_api_key_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn insert_api_key(&self, user: &UserId, key: &str) -> AppResult<ApiKeyRecord> {
        let record = ApiKeyRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.clone(),
            key: key.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO api_keys (id, user_id, key, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.user_id.as_str(),
                record.key,
                record.created_at.to_rfc3339()
            ],
        )?;
        Ok(record)
    }

    pub fn delete_api_keys_for_user(&self, user: &UserId) -> AppResult<usize> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM api_keys WHERE user_id = ?1", [user.as_str()])?;
        Ok(affected)
    }

    // ─── Feedback ───────────────────────────────────────────────────────────

    pub fn insert_feedback(&self, user: &UserId, payload: &FeedbackPayload) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feedback (id, user_id, message, category, page, user_email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                user.as_str(),
                payload.message,
                payload.category.as_deref().unwrap_or("general"),
                payload.page,
                payload.user_email,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    pub fn delete_feedback_for_user(&self, user: &UserId) -> AppResult<usize> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM feedback WHERE user_id = ?1", [user.as_str()])?;
        Ok(affected)
    }
}

fn collect_rows(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord>>,
) -> AppResult<Vec<TaskRecord>> {
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

fn parse_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        priority: parse_priority(&row.get::<_, String>(5)?)?,
        important: row.get(6)?,
        urgent: row.get(7)?,
        done: row.get(8)?,
        status: parse_status(&row.get::<_, String>(9)?)?,
        sort_order: row.get(10)?,
        created_at: parse_time(&row.get::<_, String>(11)?)?,
        archived_at: row
            .get::<_, Option<String>>(12)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        deleted_at: row
            .get::<_, Option<String>>(13)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
    })
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: UserId(row.get(0)?),
        subject: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        avatar_url: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

fn parse_api_key_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    Ok(ApiKeyRecord {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        key: row.get(2)?,
        created_at: parse_time(&row.get::<_, String>(3)?)?,
    })
}

fn parse_priority(raw: &str) -> rusqlite::Result<Priority> {
    Priority::parse(raw).ok_or_else(|| conversion_error(format!("Unknown priority '{raw}'")))
}

fn parse_status(raw: &str) -> rusqlite::Result<TaskStatus> {
    TaskStatus::parse(raw).ok_or_else(|| conversion_error(format!("Unknown status '{raw}'")))
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| conversion_error(error.to_string()))
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

#[cfg(test)]
mod tests {
    use super::{Database, TaskPatch};
    use crate::models::{Priority, TaskRecord, TaskStatus, UserId, UserProfile};
    use chrono::Utc;

    fn sample_task(id: &str, user: &str) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            user_id: UserId(user.to_string()),
            title: "Pay rent".to_string(),
            description: String::new(),
            due_date: String::new(),
            priority: Priority::Medium,
            important: true,
            urgent: true,
            done: false,
            status: TaskStatus::Active,
            sort_order: Some(1_700_000_000_000.0),
            created_at: Utc::now(),
            archived_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn database_can_insert_and_read_task() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");

        db.insert_task(&sample_task("t-1", "u-1")).expect("insert");

        let loaded = db.get_task("t-1").expect("get").expect("task exists");
        assert_eq!(loaded.title, "Pay rent");
        assert_eq!(loaded.status, TaskStatus::Active);
        assert!(loaded.deleted_at.is_none());

        let scanned = db
            .tasks_by_user_and_status(&UserId("u-1".to_string()), TaskStatus::Active)
            .expect("scan");
        assert_eq!(scanned.len(), 1);
    }

    #[test]
    fn patch_writes_only_present_columns() {
        let db = Database::in_memory().expect("db");
        db.insert_task(&sample_task("t-1", "u-1")).expect("insert");

        let patched = db
            .patch_task(
                "t-1",
                &TaskPatch {
                    title: Some("Pay rent for March".to_string()),
                    done: Some(true),
                    ..TaskPatch::default()
                },
            )
            .expect("patch");
        assert!(patched);

        let loaded = db.get_task("t-1").expect("get").expect("task exists");
        assert_eq!(loaded.title, "Pay rent for March");
        assert!(loaded.done);
        assert_eq!(loaded.priority, Priority::Medium);
    }

    #[test]
    fn patch_can_null_out_timestamps() {
        let db = Database::in_memory().expect("db");
        let mut task = sample_task("t-1", "u-1");
        task.status = TaskStatus::Deleted;
        task.deleted_at = Some(Utc::now());
        db.insert_task(&task).expect("insert");

        db.patch_task(
            "t-1",
            &TaskPatch {
                status: Some(TaskStatus::Active),
                deleted_at: Some(None),
                archived_at: Some(None),
                ..TaskPatch::default()
            },
        )
        .expect("patch");

        let loaded = db.get_task("t-1").expect("get").expect("task exists");
        assert_eq!(loaded.status, TaskStatus::Active);
        assert!(loaded.deleted_at.is_none());
    }

    #[test]
    fn empty_patch_reports_row_existence() {
        let db = Database::in_memory().expect("db");
        db.insert_task(&sample_task("t-1", "u-1")).expect("insert");

        assert!(db.patch_task("t-1", &TaskPatch::default()).expect("patch"));
        assert!(!db.patch_task("missing", &TaskPatch::default()).expect("patch"));
    }

    #[test]
    fn user_upsert_is_idempotent_and_refreshes_profile() {
        let db = Database::in_memory().expect("db");

        let first = db
            .upsert_user("clerk|abc", &UserProfile::default())
            .expect("upsert");
        let second = db
            .upsert_user(
                "clerk|abc",
                &UserProfile {
                    email: Some("a@example.com".to_string()),
                    name: Some("Ada".to_string()),
                    avatar_url: None,
                },
            )
            .expect("upsert");

        assert_eq!(first.id, second.id);
        assert_eq!(second.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn api_keys_are_looked_up_by_key_and_by_user() {
        let db = Database::in_memory().expect("db");
        let user = UserId("u-1".to_string());

        db.insert_api_key(&user, "tk_0123456789abcdef").expect("insert");

        let by_key = db
            .api_key_by_key("tk_0123456789abcdef")
            .expect("lookup")
            .expect("key exists");
        assert_eq!(by_key.user_id, user);

        let by_user = db.api_key_by_user(&user).expect("lookup").expect("key exists");
        assert_eq!(by_user.key, "tk_0123456789abcdef");

        assert_eq!(db.delete_api_keys_for_user(&user).expect("delete"), 1);
        assert!(db.api_key_by_user(&user).expect("lookup").is_none());
    }
}

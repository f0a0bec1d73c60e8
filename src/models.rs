use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque owner identity. Every lifecycle and query operation takes one
/// explicitly; there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Archived,
    Deleted,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Derived 2x2 classification of a task. Never stored; always computed from
/// the `(important, urgent)` pair at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quadrant {
    #[serde(rename = "UI")]
    Ui,
    #[serde(rename = "NUI")]
    Nui,
    #[serde(rename = "UNI")]
    Uni,
    #[serde(rename = "NUNI")]
    Nuni,
}

impl Quadrant {
    pub fn from_flags(important: bool, urgent: bool) -> Self {
        match (important, urgent) {
            (true, true) => Self::Ui,
            (true, false) => Self::Nui,
            (false, true) => Self::Uni,
            (false, false) => Self::Nuni,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ui => "UI",
            Self::Nui => "NUI",
            Self::Uni => "UNI",
            Self::Nuni => "NUNI",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ui => "Do First",
            Self::Nui => "Schedule",
            Self::Uni => "Delegate",
            Self::Nuni => "Eliminate",
        }
    }

    /// Fixed board precedence used by the `quadrant` sort key.
    pub fn rank(self) -> u8 {
        match self {
            Self::Ui => 0,
            Self::Nui => 1,
            Self::Uni => 2,
            Self::Nuni => 3,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "UI" => Some(Self::Ui),
            "NUI" => Some(Self::Nui),
            "UNI" => Some(Self::Uni),
            "NUNI" => Some(Self::Nuni),
            _ => None,
        }
    }
}

/// A task row as persisted. `archivedAt`/`deletedAt` are set on transition
/// and cleared on restore; `sortOrder` defaults to the creation instant in
/// epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: Priority,
    pub important: bool,
    pub urgent: bool,
    pub done: bool,
    pub status: TaskStatus,
    pub sort_order: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn quadrant(&self) -> Quadrant {
        Quadrant::from_flags(self.important, self.urgent)
    }

    /// Manual ordering value, falling back to creation time for legacy rows
    /// written before `sortOrder` existed.
    pub fn effective_sort_order(&self) -> f64 {
        self.sort_order
            .unwrap_or_else(|| self.created_at.timestamp_millis() as f64)
    }
}

/// A task as returned to callers: every stored field plus the derived
/// quadrant code.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: TaskRecord,
    pub quadrant: Quadrant,
}

impl From<TaskRecord> for TaskView {
    fn from(task: TaskRecord) -> Self {
        let quadrant = task.quadrant();
        Self { task, quadrant }
    }
}

/// Trash listing entry: a task view plus the whole days remaining before the
/// retention window closes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashedTaskView {
    #[serde(flatten)]
    pub view: TaskView,
    pub days_left: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub urgent: bool,
}

/// Partial update. Only present fields are applied; `priority`/`status`
/// arrive as raw strings so that unrecognized values can be dropped instead
/// of failing the whole patch (permissive-merge contract).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub important: Option<bool>,
    pub urgent: Option<bool>,
    pub done: Option<bool>,
    pub status: Option<String>,
    pub sort_order: Option<f64>,
}

/// One entry of a batch reorder. Carries the new manual position and, for
/// cross-quadrant drags, the flipped classification flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderUpdate {
    pub task_id: String,
    pub sort_order: f64,
    pub important: Option<bool>,
    pub urgent: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub id: String,
    pub user_id: UserId,
    pub key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPayload {
    pub message: String,
    pub category: Option<String>,
    pub page: Option<String>,
    pub user_email: Option<String>,
}

/// Per-collection counts removed by a user-data cascade. The cascade is
/// best-effort: a failed collection leaves its count at zero and the rest
/// still proceed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedUserData {
    pub tasks: usize,
    pub api_keys: usize,
    pub feedback: usize,
    pub user: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub returned: usize,
}

/// Response envelope of the list pipeline. `pagination` is present only when
/// the caller supplied a limit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<TaskView>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrant_is_a_pure_function_of_the_flag_pair() {
        assert_eq!(Quadrant::from_flags(true, true), Quadrant::Ui);
        assert_eq!(Quadrant::from_flags(true, false), Quadrant::Nui);
        assert_eq!(Quadrant::from_flags(false, true), Quadrant::Uni);
        assert_eq!(Quadrant::from_flags(false, false), Quadrant::Nuni);
    }

    #[test]
    fn quadrant_parse_is_case_insensitive() {
        assert_eq!(Quadrant::parse("nui"), Some(Quadrant::Nui));
        assert_eq!(Quadrant::parse("UNI"), Some(Quadrant::Uni));
        assert_eq!(Quadrant::parse("fifth"), None);
    }

    #[test]
    fn enum_strings_round_trip() {
        for priority in ["low", "medium", "high"] {
            assert_eq!(Priority::parse(priority).expect("priority").as_str(), priority);
        }
        for status in ["active", "archived", "deleted"] {
            assert_eq!(TaskStatus::parse(status).expect("status").as_str(), status);
        }
        assert!(Priority::parse("urgent").is_none());
        assert!(TaskStatus::parse("trashed").is_none());
    }

    #[test]
    fn task_view_serializes_flattened_with_quadrant_code() {
        let task = TaskRecord {
            id: "t-1".to_string(),
            user_id: UserId("u-1".to_string()),
            title: "Pay rent".to_string(),
            description: String::new(),
            due_date: String::new(),
            priority: Priority::Medium,
            important: true,
            urgent: false,
            done: false,
            status: TaskStatus::Active,
            sort_order: Some(1.0),
            created_at: Utc::now(),
            archived_at: None,
            deleted_at: None,
        };

        let json = serde_json::to_value(TaskView::from(task)).expect("serialize");
        assert_eq!(json["quadrant"], "NUI");
        assert_eq!(json["id"], "t-1");
        assert_eq!(json["dueDate"], "");
    }
}

//! User profiles and the write-only feedback channel. Profiles are created
//! lazily on first authenticated contact and refreshed from the identity
//! provider on each login; the core never mutates them otherwise.

use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{DeletedUserData, FeedbackPayload, UserId, UserProfile, UserRecord};
use std::sync::Arc;

pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get-or-create keyed by the external identity subject, refreshing
    /// profile fields in the same call.
    pub fn sync_user(&self, subject: &str, profile: &UserProfile) -> AppResult<UserRecord> {
        if subject.trim().is_empty() {
            return Err(AppError::Validation("Identity subject is required".to_string()));
        }
        self.db.upsert_user(subject, profile)
    }

    pub fn by_subject(&self, subject: &str) -> AppResult<Option<UserRecord>> {
        self.db.user_by_subject(subject)
    }

    pub fn submit_feedback(&self, user: &UserId, payload: FeedbackPayload) -> AppResult<String> {
        if payload.message.trim().is_empty() {
            return Err(AppError::Validation("Feedback message is required".to_string()));
        }
        self.db.insert_feedback(user, &payload)
    }

    /// Removes everything the user owns: tasks, API keys, feedback, then the
    /// profile itself. Best-effort per collection; a failure is logged and
    /// the rest still proceeds.
    pub fn delete_user_data(&self, user: &UserId) -> AppResult<DeletedUserData> {
        let mut result = DeletedUserData::default();

        match self.db.tasks_by_user(user) {
            Ok(tasks) => {
                for task in tasks {
                    match self.db.delete_task(&task.id) {
                        Ok(true) => result.tasks += 1,
                        Ok(false) => {}
                        Err(error) => {
                            tracing::warn!(task_id = %task.id, %error, "failed to delete task in cascade");
                        }
                    }
                }
            }
            Err(error) => tracing::warn!(user = %user, %error, "failed to scan tasks in cascade"),
        }

        match self.db.delete_api_keys_for_user(user) {
            Ok(count) => result.api_keys = count,
            Err(error) => tracing::warn!(user = %user, %error, "failed to delete api keys in cascade"),
        }

        match self.db.delete_feedback_for_user(user) {
            Ok(count) => result.feedback = count,
            Err(error) => tracing::warn!(user = %user, %error, "failed to delete feedback in cascade"),
        }

        result.user = self.db.delete_user(user)?;
        tracing::info!(user = %user, tasks = result.tasks, "user data deleted");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::models::CreateTaskPayload;
    use crate::retention::RetentionPolicy;
    use crate::tasks::TaskService;

    #[test]
    fn sync_user_creates_then_refreshes() {
        let service = UserService::new(Arc::new(Database::in_memory().expect("db")));

        let created = service
            .sync_user("clerk|42", &UserProfile::default())
            .expect("sync");
        assert!(created.email.is_none());

        let refreshed = service
            .sync_user(
                "clerk|42",
                &UserProfile {
                    email: Some("ada@example.com".to_string()),
                    name: Some("Ada".to_string()),
                    avatar_url: Some("https://example.com/a.png".to_string()),
                },
            )
            .expect("sync");
        assert_eq!(refreshed.id, created.id);
        assert_eq!(refreshed.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn sync_user_rejects_blank_subject() {
        let service = UserService::new(Arc::new(Database::in_memory().expect("db")));
        assert!(matches!(
            service.sync_user("  ", &UserProfile::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn feedback_requires_a_message() {
        let service = UserService::new(Arc::new(Database::in_memory().expect("db")));
        let user = UserId("u-1".to_string());

        assert!(matches!(
            service.submit_feedback(
                &user,
                FeedbackPayload {
                    message: "   ".to_string(),
                    category: None,
                    page: None,
                    user_email: None,
                },
            ),
            Err(AppError::Validation(_))
        ));

        let id = service
            .submit_feedback(
                &user,
                FeedbackPayload {
                    message: "Love the trash view".to_string(),
                    category: None,
                    page: Some("/trash".to_string()),
                    user_email: None,
                },
            )
            .expect("submit");
        assert!(!id.is_empty());
    }

    #[test]
    fn cascade_removes_tasks_keys_feedback_and_profile() {
        let db = Arc::new(Database::in_memory().expect("db"));
        let users = UserService::new(db.clone());
        let auth = AuthService::new(db.clone());
        let tasks = TaskService::new(db.clone(), RetentionPolicy::default());

        let record = users
            .sync_user("clerk|gone", &UserProfile::default())
            .expect("sync");
        tasks
            .create(
                &record.id,
                CreateTaskPayload {
                    title: "Orphan me".to_string(),
                    description: None,
                    due_date: None,
                    priority: None,
                    important: false,
                    urgent: false,
                },
            )
            .expect("create");
        auth.get_or_create(&record.id).expect("key");
        users
            .submit_feedback(
                &record.id,
                FeedbackPayload {
                    message: "bye".to_string(),
                    category: None,
                    page: None,
                    user_email: None,
                },
            )
            .expect("feedback");

        let deleted = users.delete_user_data(&record.id).expect("cascade");
        assert_eq!(deleted.tasks, 1);
        assert_eq!(deleted.api_keys, 1);
        assert_eq!(deleted.feedback, 1);
        assert!(deleted.user);

        assert!(users.by_subject("clerk|gone").expect("lookup").is_none());
        assert!(auth.get(&record.id).expect("get").is_none());
    }
}

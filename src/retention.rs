//! Trash retention: a read-time filter that hides expired rows from every
//! trash view, plus a timer-driven sweeper that reclaims them for real. The
//! filter stays in place as a safety net between sweeps.

use crate::db::Database;
use crate::models::TaskStatus;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionPolicy {
    pub fn new(days: u32) -> Self {
        Self { days }
    }

    fn window(self) -> Duration {
        Duration::days(i64::from(self.days))
    }

    /// Rows with no `deletedAt` never expire; they stay visible until a
    /// lifecycle transition stamps them.
    pub fn is_expired(self, deleted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match deleted_at {
            Some(deleted_at) => now - deleted_at >= self.window(),
            None => false,
        }
    }

    /// Whole days remaining before the window closes, floored at zero.
    pub fn days_left(self, deleted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
        match deleted_at {
            Some(deleted_at) => {
                let elapsed_days = (now - deleted_at).num_days();
                (i64::from(self.days) - elapsed_days).max(0)
            }
            None => i64::from(self.days),
        }
    }
}

/// Background purge of expired trash across all users. Scans the trashed
/// rows, applies the cutoff in process (the store only does equality scans),
/// and deletes row by row so a mid-sweep failure loses nothing but that row.
#[derive(Clone)]
pub struct RetentionSweeper {
    db: Arc<Database>,
    policy: RetentionPolicy,
    interval: std::time::Duration,
}

impl RetentionSweeper {
    pub fn new(db: Arc<Database>, policy: RetentionPolicy, interval: std::time::Duration) -> Self {
        Self {
            db,
            policy,
            interval,
        }
    }

    pub fn start(&self) {
        let sweeper = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweeper.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match sweeper.sweep(Utc::now()) {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "retention sweep purged expired trash"),
                    Err(error) => tracing::warn!(%error, "retention sweep failed"),
                }
            }
        });
    }

    /// One pass; returns the number of rows purged. Per-row failures are
    /// logged and skipped.
    pub fn sweep(&self, now: DateTime<Utc>) -> crate::errors::AppResult<usize> {
        let trashed = self.db.tasks_by_status(TaskStatus::Deleted)?;
        let mut purged = 0usize;
        for task in trashed {
            if !self.policy.is_expired(task.deleted_at, now) {
                continue;
            }
            match self.db.delete_task(&task.id) {
                Ok(true) => purged += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(task_id = %task.id, %error, "failed to purge expired task");
                }
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TaskRecord, UserId};

    fn trashed_task(id: &str, deleted_at: Option<DateTime<Utc>>) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            user_id: UserId("u-1".to_string()),
            title: "trashed".to_string(),
            description: String::new(),
            due_date: String::new(),
            priority: Priority::Medium,
            important: false,
            urgent: false,
            done: false,
            status: TaskStatus::Deleted,
            sort_order: None,
            created_at: Utc::now(),
            archived_at: None,
            deleted_at,
        }
    }

    #[test]
    fn expiry_boundary_is_thirty_days() {
        let policy = RetentionPolicy::default();
        let now = Utc::now();

        assert!(policy.is_expired(Some(now - Duration::days(31)), now));
        assert!(!policy.is_expired(Some(now - Duration::days(29)), now));
        assert!(!policy.is_expired(None, now));
    }

    #[test]
    fn days_left_floors_at_zero() {
        let policy = RetentionPolicy::default();
        let now = Utc::now();

        assert_eq!(policy.days_left(Some(now - Duration::days(29)), now), 1);
        assert_eq!(policy.days_left(Some(now - Duration::days(45)), now), 0);
        assert_eq!(policy.days_left(None, now), 30);
    }

    #[test]
    fn sweep_purges_only_expired_rows() {
        let db = Arc::new(Database::in_memory().expect("db"));
        let now = Utc::now();

        db.insert_task(&trashed_task("t-stale", Some(now - Duration::days(31))))
            .expect("insert");
        db.insert_task(&trashed_task("t-fresh", Some(now - Duration::days(5))))
            .expect("insert");
        db.insert_task(&trashed_task("t-unstamped", None)).expect("insert");

        let sweeper = RetentionSweeper::new(
            db.clone(),
            RetentionPolicy::default(),
            std::time::Duration::from_secs(3600),
        );
        let purged = sweeper.sweep(now).expect("sweep");

        assert_eq!(purged, 1);
        assert!(db.get_task("t-stale").expect("get").is_none());
        assert!(db.get_task("t-fresh").expect("get").is_some());
        assert!(db.get_task("t-unstamped").expect("get").is_some());
    }
}

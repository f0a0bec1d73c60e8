use quadrantd::api::{create_router, AppState};
use quadrantd::auth::AuthService;
use quadrantd::config::Config;
use quadrantd::db::Database;
use quadrantd::models::UserProfile;
use quadrantd::retention::{RetentionPolicy, RetentionSweeper};
use quadrantd::tasks::TaskService;
use quadrantd::users::UserService;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_dir.as_deref())?;

    let db = Arc::new(Database::new(&config.db_path)?);
    let retention = RetentionPolicy::new(config.retention_days);

    let tasks = Arc::new(TaskService::new(db.clone(), retention));
    let auth = Arc::new(AuthService::new(db.clone()));
    let users = UserService::new(db.clone());

    if let Some(subject) = &config.bootstrap_subject {
        let record = users.sync_user(subject, &UserProfile::default())?;
        let key = auth.get_or_create(&record.id)?;
        tracing::info!(subject = %subject, key = %key, "bootstrap identity ready");
    }

    let sweeper = RetentionSweeper::new(
        db.clone(),
        retention,
        Duration::from_secs(config.sweep_interval_secs),
    );
    sweeper.start();

    let router = create_router(AppState { tasks, auth });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, db = %config.db_path.display(), "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "quadrantd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .json()
                .with_writer(non_blocking)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        }
    }
    Ok(())
}

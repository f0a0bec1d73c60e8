//! Environment-driven configuration, loaded once at startup. Every knob has
//! a default so a bare `quadrantd` starts with a local database and no log
//! directory (stdout logging).

use crate::retention::DEFAULT_RETENTION_DAYS;
use std::env;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DB_PATH: &str = "quadrantd.db";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub retention_days: u32,
    pub sweep_interval_secs: u64,
    /// When set, the named identity subject is upserted at startup and its
    /// lazily created API key is logged, so a fresh deployment can mint a
    /// first credential without a UI.
    pub bootstrap_subject: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_dir: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            bootstrap_subject: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env::var("QUADRANTD_BIND").unwrap_or(defaults.bind_addr),
            db_path: env::var("QUADRANTD_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_dir: env::var("QUADRANTD_LOG_DIR").ok().map(PathBuf::from),
            retention_days: env::var("QUADRANTD_RETENTION_DAYS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.retention_days),
            sweep_interval_secs: env::var("QUADRANTD_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.sweep_interval_secs),
            bootstrap_subject: env::var("QUADRANTD_BOOTSTRAP_SUBJECT")
                .ok()
                .filter(|subject| !subject.trim().is_empty()),
        }
    }
}

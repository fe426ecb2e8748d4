use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::db;
use crate::library::lifecycle::DEFAULT_LOAN_PERIOD_DAYS;

pub const ENV_WORKSPACE: &str = "LIBRARYD_WORKSPACE";
pub const ENV_LOG: &str = "LIBRARYD_LOG";
pub const ENV_BUSY_TIMEOUT_MS: &str = "LIBRARYD_BUSY_TIMEOUT_MS";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const LOAN_PERIOD_KEY: &str = "library.loanPeriodDays";
const MAX_LOAN_PERIOD_DAYS: i64 = 365;

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub busy_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup(ENV_WORKSPACE)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let busy_timeout = match lookup(ENV_BUSY_TIMEOUT_MS) {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be milliseconds, got {:?}", ENV_BUSY_TIMEOUT_MS, raw))?;
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        };
        Ok(Self {
            workspace,
            busy_timeout,
        })
    }
}

/// Lending rules stored in the workspace `settings` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibrarySettings {
    pub loan_period_days: i64,
}

impl LibrarySettings {
    /// Reads the stored loan period. A missing or out-of-range value (for
    /// example from an imported workspace) falls back to the default.
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        let stored = db::settings_get_json(conn, LOAN_PERIOD_KEY)?;
        let days = match stored.as_ref().map(|v| v.get("days").and_then(|d| d.as_i64())) {
            None => DEFAULT_LOAN_PERIOD_DAYS,
            Some(Some(days)) if validate_loan_period(days).is_ok() => days,
            Some(_) => {
                warn!(
                    key = LOAN_PERIOD_KEY,
                    stored = ?stored,
                    default = DEFAULT_LOAN_PERIOD_DAYS,
                    "ignoring unusable loan period setting"
                );
                DEFAULT_LOAN_PERIOD_DAYS
            }
        };
        Ok(Self {
            loan_period_days: days,
        })
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        validate_loan_period(self.loan_period_days)?;
        db::settings_set_json(conn, LOAN_PERIOD_KEY, &json!({ "days": self.loan_period_days }))
    }

    pub fn loan_period(&self) -> chrono::Duration {
        chrono::Duration::days(self.loan_period_days)
    }
}

pub fn validate_loan_period(days: i64) -> anyhow::Result<()> {
    if !(1..=MAX_LOAN_PERIOD_DAYS).contains(&days) {
        return Err(anyhow!(
            "loanPeriodDays must be between 1 and {}",
            MAX_LOAN_PERIOD_DAYS
        ));
    }
    Ok(())
}

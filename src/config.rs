//! Runtime settings resolved from the environment.
//!
//! Everything here has a working default; the environment only overrides.
//! Account configuration lives in [`crate::accounts`], not here.

use crate::keepalive::probe::DEFAULT_STATUS_URL;
use crate::store::DEFAULT_HISTORY_LIMIT;

/// Overrides the platform status endpoint, e.g. to point at a mock server.
pub const ENV_STATUS_URL: &str = "PULSEKEEPER_STATUS_URL";
/// Path of the sqlite status store. Unset means no persistence at all.
pub const ENV_STORE: &str = "PULSEKEEPER_STORE";
/// Overrides the cron expression for background runs.
pub const ENV_SCHEDULE: &str = "PULSEKEEPER_SCHEDULE";
/// Overrides how many run records the history keeps.
pub const ENV_HISTORY_LIMIT: &str = "PULSEKEEPER_HISTORY_LIMIT";

/// Every 30 minutes, on the half hour.
pub const DEFAULT_SCHEDULE: &str = "0 */30 * * * *";

/// Raw environment values, captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct SettingsSources {
    pub status_url: Option<String>,
    pub store_path: Option<String>,
    pub schedule: Option<String>,
    pub history_limit: Option<String>,
}

impl SettingsSources {
    pub fn from_env() -> Self {
        Self {
            status_url: std::env::var(ENV_STATUS_URL).ok(),
            store_path: std::env::var(ENV_STORE).ok(),
            schedule: std::env::var(ENV_SCHEDULE).ok(),
            history_limit: std::env::var(ENV_HISTORY_LIMIT).ok(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub status_url: String,
    /// None means run without persistence.
    pub store_path: Option<String>,
    /// Six-field cron expression. Validated where the scheduler starts, not
    /// here, so one-shot commands never trip over a bad schedule.
    pub schedule: String,
    pub history_limit: usize,
}

impl Settings {
    pub fn resolve(sources: &SettingsSources) -> Self {
        let status_url = non_empty(&sources.status_url)
            .unwrap_or(DEFAULT_STATUS_URL)
            .to_string();
        let store_path = non_empty(&sources.store_path).map(str::to_string);
        let schedule = non_empty(&sources.schedule)
            .unwrap_or(DEFAULT_SCHEDULE)
            .to_string();
        let history_limit = match non_empty(&sources.history_limit) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    tracing::warn!(
                        value = raw,
                        "ignoring invalid {ENV_HISTORY_LIMIT}, using default"
                    );
                    DEFAULT_HISTORY_LIMIT
                }
            },
            None => DEFAULT_HISTORY_LIMIT,
        };

        Settings {
            status_url,
            store_path,
            schedule,
            history_limit,
        }
    }

    pub fn from_env() -> Self {
        Self::resolve(&SettingsSources::from_env())
    }
}

/// Empty strings count as unset, same as the account variables.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

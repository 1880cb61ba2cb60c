//! Cron-driven background runs.

use anyhow::{Context, Result};
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::{self, AccountSources};
use crate::keepalive::{self, probe::PlatformProbe, RunSource};
use crate::store::StatusStore;

/// Parse a six-field cron expression, e.g. `0 */30 * * * *`.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr).with_context(|| format!("invalid cron expression '{expr}'"))
}

/// Fire a full keep-alive run at every occurrence of `schedule`, forever.
///
/// Nothing runs at startup; the first run happens at the first occurrence
/// after launch. Accounts are re-resolved before each run so the log lines a
/// run produces match what a manual trigger would see.
pub async fn run_scheduler_loop(
    schedule: Schedule,
    sources: AccountSources,
    probe: Arc<dyn PlatformProbe>,
    store: StatusStore,
) {
    info!("scheduler started");

    loop {
        let now = Utc::now();
        let Some(next) = schedule.after(&now).next() else {
            warn!("cron schedule has no future occurrence, scheduler stopping");
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next = %next.to_rfc3339(), "waiting for next scheduled run");
        tokio::time::sleep(wait).await;

        let accounts = accounts::resolve(&sources);
        let summary = keepalive::run(
            &accounts,
            probe.as_ref(),
            &store,
            RunSource::Scheduled,
            None,
        )
        .await;
        info!(success = summary.success, "scheduled run finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SCHEDULE;

    #[test]
    fn test_default_schedule_parses() {
        let schedule = parse_schedule(DEFAULT_SCHEDULE).unwrap();
        let next = schedule.after(&Utc::now()).next().unwrap();
        assert!(next > Utc::now() - chrono::Duration::seconds(1));
        // Half-hour cadence fires on minute 0 or 30.
        use chrono::Timelike;
        assert!(next.minute() == 0 || next.minute() == 30);
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn test_garbage_expression_is_rejected() {
        let err = parse_schedule("whenever").unwrap_err();
        assert!(err.to_string().contains("invalid cron expression"));
    }

    #[test]
    fn test_five_field_expressions_are_rejected() {
        // The cron crate wants six fields (seconds first).
        assert!(parse_schedule("*/30 * * * *").is_err());
    }
}

//! Keep-alive orchestration -- the per-account run loop and its summary.

pub mod probe;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::accounts::{Account, ENV_ACCOUNTS};
use crate::store::{AccountStatusPatch, HistoryEntry, RunStatus, StatusStore};
use probe::{PingOutcome, PlatformProbe, StatusOutcome};

/// What started a run; interpolated into the header log line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunSource {
    Scheduled,
    Dashboard,
    SingleAccount,
    Manual,
}

impl std::fmt::Display for RunSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunSource::Scheduled => write!(f, "Cron Scheduled"),
            RunSource::Dashboard => write!(f, "Web Dashboard"),
            RunSource::SingleAccount => write!(f, "Single Account Trigger"),
            RunSource::Manual => write!(f, "Manual"),
        }
    }
}

/// Result of processing one account within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRunResult {
    pub id: String,
    pub name: String,
    /// True only when the status-API call succeeded. The app ping never
    /// changes this flag.
    pub success: bool,
    /// Wall-clock milliseconds for this account's full processing.
    pub duration: u64,
    pub logs: Vec<String>,
    pub timestamp: String,
}

/// Aggregate outcome of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub logs: Vec<String>,
    pub results: Vec<AccountRunResult>,
}

/// Run the keep-alive pass over `accounts`, or over the single account
/// selected by id.
///
/// Accounts are processed strictly one after another: the aggregate log keeps
/// a stable per-account order and store writes never race within one
/// invocation. One account's failure never stops the loop. A selector that
/// matches nothing yields an empty processing list, whose success is
/// vacuously true.
///
/// Every outer log line carries the timestamp captured at run start, so a
/// whole run reads as one block in the history view.
pub async fn run(
    accounts: &[Account],
    probe: &dyn PlatformProbe,
    store: &StatusStore,
    source: RunSource,
    selector: Option<&str>,
) -> RunSummary {
    let stamp = Utc::now().to_rfc3339();
    let mut logs = Vec::new();
    let mut results = Vec::new();
    let mut all_success = true;

    tracing::info!(%source, accounts = accounts.len(), "keep-alive run started");

    logs.push(format!(
        "[{stamp}] 🚀 Keep-alive run started (source: {source})"
    ));
    logs.push(format!("[{stamp}] 📊 Found {} accounts", accounts.len()));

    if accounts.is_empty() {
        logs.push(format!(
            "[{stamp}] ❌ Error: no accounts configured. Set {ENV_ACCOUNTS}."
        ));
        tracing::warn!("keep-alive run without any configured accounts");
        store
            .append_history(HistoryEntry {
                time: Utc::now().to_rfc3339(),
                status: RunStatus::Error,
                messages: logs.clone(),
            })
            .await;
        return RunSummary {
            success: false,
            logs,
            results,
        };
    }

    let selected: Vec<&Account> = match selector {
        Some(id) => accounts.iter().filter(|account| account.id == id).collect(),
        None => accounts.iter().collect(),
    };

    for account in selected {
        logs.push(format!(
            "[{stamp}] 🔄 Processing account: {} (ID: {})",
            account.name, account.id
        ));

        let started = Instant::now();
        let mut account_success = true;
        let mut account_logs = Vec::new();

        let api_started = Instant::now();
        let outcome = probe.account_status(&account.token).await;
        let api_ms = api_started.elapsed().as_millis();

        match outcome {
            StatusOutcome::Verified { email } => {
                account_logs.push(format!(
                    "✅ Status API verified ({api_ms}ms) - user: {email}"
                ));
            }
            StatusOutcome::Rejected { status, reason } => {
                account_success = false;
                all_success = false;
                account_logs.push(format!("❌ Status API failed: {status} {reason}"));
            }
            StatusOutcome::Failed { message } => {
                account_success = false;
                all_success = false;
                account_logs.push(format!("❌ Status API request error: {message}"));
            }
        }

        if let Some(app_url) = account.app_url.as_deref() {
            let ping_started = Instant::now();
            match probe.app_ping(app_url).await {
                PingOutcome::Responded { status } => {
                    let ping_ms = ping_started.elapsed().as_millis();
                    account_logs.push(format!("🌐 App ping: {status} ({ping_ms}ms)"));
                }
                PingOutcome::Failed { message } => {
                    account_logs.push(format!("⚠️ App ping failed: {message}"));
                }
            }
        }

        let duration = started.elapsed().as_millis() as u64;
        let finished_at = Utc::now().to_rfc3339();

        tracing::info!(
            account = %account.id,
            success = account_success,
            duration_ms = duration,
            "account processed"
        );

        results.push(AccountRunResult {
            id: account.id.clone(),
            name: account.name.clone(),
            success: account_success,
            duration,
            logs: account_logs.clone(),
            timestamp: finished_at.clone(),
        });

        store
            .update_account_status(
                &account.id,
                &AccountStatusPatch {
                    name: account.name.clone(),
                    last_run: finished_at,
                    success: account_success,
                    last_duration: duration,
                },
            )
            .await;

        let icon = if account_success { "✅" } else { "❌" };
        logs.push(format!(
            "[{stamp}] {icon} Account {} finished ({duration}ms)",
            account.name
        ));
        for line in &account_logs {
            logs.push(format!("[{stamp}]   {line}"));
        }
    }

    store
        .append_history(HistoryEntry {
            time: Utc::now().to_rfc3339(),
            status: RunStatus::from_success(all_success),
            messages: logs.clone(),
        })
        .await;

    tracing::info!(success = all_success, results = results.len(), "keep-alive run finished");

    RunSummary {
        success: all_success,
        logs,
        results,
    }
}

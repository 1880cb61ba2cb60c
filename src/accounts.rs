//! Account registry -- resolves raw configuration into a normalized account list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Environment variable holding the JSON account list.
pub const ENV_ACCOUNTS: &str = "PULSEKEEPER_ACCOUNTS";
/// Legacy single-account token variable.
pub const ENV_LEGACY_TOKEN: &str = "PULSEKEEPER_TOKEN";
/// Legacy single-account app URL variable.
pub const ENV_LEGACY_APP_URL: &str = "PULSEKEEPER_APP_URL";
/// Environment variable holding the JSON name-to-URL map.
pub const ENV_APP_URLS: &str = "PULSEKEEPER_APP_URLS";

/// One configured platform account.
///
/// `id` is derived from configuration order and is unique within a resolved
/// list. `name` is a display name and the join key for the app-URL map, so a
/// duplicate name means the last map entry wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub token: String,
    pub app_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("account list is not valid JSON: {0}")]
    List(#[from] serde_json::Error),
}

/// Raw, untyped account configuration as read from the process environment.
///
/// Captured once at startup; resolution re-runs on this snapshot for every
/// invocation so repeated parses are deterministic.
#[derive(Debug, Clone, Default)]
pub struct AccountSources {
    pub list_json: Option<String>,
    pub legacy_token: Option<String>,
    pub legacy_app_url: Option<String>,
    pub app_urls_json: Option<String>,
}

impl AccountSources {
    pub fn from_env() -> Self {
        Self {
            list_json: std::env::var(ENV_ACCOUNTS).ok(),
            legacy_token: std::env::var(ENV_LEGACY_TOKEN).ok(),
            legacy_app_url: std::env::var(ENV_LEGACY_APP_URL).ok(),
            app_urls_json: std::env::var(ENV_APP_URLS).ok(),
        }
    }
}

/// Resolve the account list, collapsing any parse failure to "no accounts".
///
/// Callers treat an empty list as a configuration error surfaced in the run
/// log, never as a reason to abort the process.
pub fn resolve(sources: &AccountSources) -> Vec<Account> {
    match parse_accounts(sources) {
        Ok(accounts) => accounts,
        Err(err) => {
            tracing::warn!(%err, "account configuration unparsable, treating as empty");
            Vec::new()
        }
    }
}

/// Typed parse of the account configuration.
///
/// Order of precedence:
/// 1. JSON list form: one account per entry, `id = acc_<1-based index>`,
///    name defaulting to `Account <index>`. Entries are taken verbatim; a
///    missing token yields an account the remote API will reject.
/// 2. Legacy single token: exactly one `acc_1` / `Default Account`.
/// 3. Neither present: empty list.
///
/// A separate name-to-URL map fills in `appUrl` for accounts that lack one;
/// it never overwrites. A malformed map is logged and skipped without
/// affecting resolution, while a malformed account list aborts it (the legacy
/// form is deliberately not consulted in that case).
pub fn parse_accounts(sources: &AccountSources) -> Result<Vec<Account>, RegistryError> {
    let mut accounts = Vec::new();

    if let Some(raw) = sources.list_json.as_deref() {
        let value: Value = serde_json::from_str(raw)?;
        if let Some(entries) = value.as_array() {
            for (index, entry) in entries.iter().enumerate() {
                accounts.push(Account {
                    id: format!("acc_{}", index + 1),
                    name: non_empty(entry.get("name"))
                        .unwrap_or_else(|| format!("Account {}", index + 1)),
                    token: non_empty(entry.get("token")).unwrap_or_default(),
                    app_url: non_empty(entry.get("appUrl")),
                });
            }
        }
    }

    if accounts.is_empty() {
        if let Some(token) = sources.legacy_token.as_deref().filter(|t| !t.is_empty()) {
            accounts.push(Account {
                id: "acc_1".to_string(),
                name: "Default Account".to_string(),
                token: token.to_string(),
                app_url: sources
                    .legacy_app_url
                    .clone()
                    .filter(|url| !url.is_empty()),
            });
        }
    }

    if let Some(raw) = sources.app_urls_json.as_deref() {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                if let Some(map) = value.as_object() {
                    for account in &mut accounts {
                        if account.app_url.is_none() {
                            if let Some(url) = non_empty(map.get(&account.name)) {
                                account.app_url = Some(url);
                            }
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, "app URL map unparsable, skipping merge");
            }
        }
    }

    Ok(accounts)
}

// Empty strings behave as absent, matching the truthiness rules of the
// legacy configuration format. Non-string values are treated as absent.
fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

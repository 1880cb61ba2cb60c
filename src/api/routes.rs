//! API route definitions.
//!
//! Response bodies are the run structures serialized as-is, with no envelope.
//! The dashboard's client script consumes them directly.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::state::AppState;
use crate::accounts::{self, Account};
use crate::keepalive::{self, RunSource, RunSummary};
use crate::store::HistoryEntry;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/trigger", get(trigger))
        .route("/trigger-account", get(trigger_account))
        .route("/accounts", get(list_accounts))
        .route("/account-status", get(account_status))
        .route("/logs", get(logs))
}

/// Run every configured account once.
async fn trigger(State(state): State<AppState>) -> Json<RunSummary> {
    let accounts = accounts::resolve(&state.sources);
    let summary = keepalive::run(
        &accounts,
        state.probe.as_ref(),
        &state.store,
        RunSource::Dashboard,
        None,
    )
    .await;
    Json(summary)
}

#[derive(Deserialize)]
struct TriggerAccountParams {
    id: Option<String>,
}

/// Run one account, selected by id. An unknown id is not an error; the run
/// simply processes nothing.
async fn trigger_account(
    State(state): State<AppState>,
    Query(params): Query<TriggerAccountParams>,
) -> Result<Json<RunSummary>, (StatusCode, Json<Value>)> {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "No account ID provided" })),
        ));
    };

    let accounts = accounts::resolve(&state.sources);
    let summary = keepalive::run(
        &accounts,
        state.probe.as_ref(),
        &state.store,
        RunSource::SingleAccount,
        Some(&id),
    )
    .await;
    Ok(Json(summary))
}

/// Resolved account list, tokens included as configured.
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<Account>> {
    Json(accounts::resolve(&state.sources))
}

async fn account_status(State(state): State<AppState>) -> Json<Map<String, Value>> {
    Json(state.store.account_status().await)
}

/// Stored run history, most recent first. Empty without a bound store.
async fn logs(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.store.history().await)
}

//! Server-rendered dashboard page.

use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::accounts::{self, Account};
use crate::api::state::AppState;

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    version: &'static str,
    accounts: Vec<Account>,
    /// Serialized account list for the client script, tokens included as
    /// configured.
    accounts_json: String,
    store_bound: bool,
}

/// Serve the dashboard. Mounted as the router fallback, so every path
/// outside `/api` lands here.
pub async fn page(State(state): State<AppState>) -> Response {
    let accounts = accounts::resolve(&state.sources);
    let accounts_json = serde_json::to_string(&accounts).unwrap_or_else(|_| "[]".to_string());

    let template = DashboardTemplate {
        version: env!("CARGO_PKG_VERSION"),
        accounts,
        accounts_json,
        store_bound: state.store.is_bound(),
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "dashboard template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

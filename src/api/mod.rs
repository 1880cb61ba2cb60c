//! API layer -- axum routes, handlers, and middleware.

mod routes;
pub mod state;

use self::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the application router: JSON API under `/api`, the dashboard page
/// on every other path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .fallback(crate::dashboard::page)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountSources;
    use crate::keepalive::probe::{PingOutcome, PlatformProbe, StatusOutcome};
    use crate::store::{MemoryKv, StatusStore, DEFAULT_HISTORY_LIMIT};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct AlwaysVerified;

    #[async_trait]
    impl PlatformProbe for AlwaysVerified {
        async fn account_status(&self, _token: &str) -> StatusOutcome {
            StatusOutcome::Verified {
                email: "probe@example.com".to_string(),
            }
        }

        async fn app_ping(&self, _url: &str) -> PingOutcome {
            PingOutcome::Responded { status: 200 }
        }
    }

    fn test_state(list_json: Option<&str>) -> AppState {
        AppState {
            sources: AccountSources {
                list_json: list_json.map(str::to_string),
                ..Default::default()
            },
            probe: Arc::new(AlwaysVerified),
            store: StatusStore::new(Some(Arc::new(MemoryKv::default())), DEFAULT_HISTORY_LIMIT),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_accounts_route_returns_resolved_list() {
        let app = router(test_state(Some(r#"[{"name":"A","token":"t1"}]"#)));
        let (status, body) = get_json(app, "/api/accounts").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "acc_1");
        assert_eq!(body[0]["name"], "A");
        assert_eq!(body[0]["token"], "t1");
    }

    #[tokio::test]
    async fn test_trigger_runs_and_persists() {
        let state = test_state(Some(r#"[{"name":"A","token":"t1"}]"#));
        let store = state.store.clone();
        let app = router(state);

        let (status, body) = get_json(app, "/api/trigger").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["results"][0]["name"], "A");
        assert_eq!(store.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_account_without_id_is_rejected() {
        let app = router(test_state(Some(r#"[{"name":"A","token":"t1"}]"#)));
        let (status, body) = get_json(app, "/api/trigger-account").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No account ID provided");
    }

    #[tokio::test]
    async fn test_trigger_account_with_empty_id_is_rejected() {
        let app = router(test_state(Some(r#"[{"name":"A","token":"t1"}]"#)));
        let (status, _) = get_json(app, "/api/trigger-account?id=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_trigger_account_with_unknown_id_is_a_vacuous_success() {
        let app = router(test_state(Some(r#"[{"name":"A","token":"t1"}]"#)));
        let (status, body) = get_json(app, "/api/trigger-account?id=acc_42").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["results"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_logs_route_is_most_recent_first() {
        let state = test_state(Some(r#"[{"name":"A","token":"t1"}]"#));
        let app = router(state);

        let _ = get_json(app.clone(), "/api/trigger").await;
        let _ = get_json(app.clone(), "/api/trigger").await;
        let (status, body) = get_json(app, "/api/logs").await;

        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0]["time"].as_str().unwrap() >= entries[1]["time"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_account_status_route_reflects_last_run() {
        let state = test_state(Some(r#"[{"name":"A","token":"t1"}]"#));
        let app = router(state);

        let _ = get_json(app.clone(), "/api/trigger").await;
        let (status, body) = get_json(app, "/api/account-status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["acc_1"]["success"], true);
        assert!(body["acc_1"]["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_path_serves_the_dashboard() {
        let app = router(test_state(Some(r#"[{"name":"A","token":"t1"}]"#)));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/html"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("PulseKeeper"));
        assert!(html.contains("acc_1"));
    }
}

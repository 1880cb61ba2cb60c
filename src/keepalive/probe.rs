//! Outbound probes -- the account-status call and the best-effort app ping.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Default account-status endpoint (the platform's profile API).
pub const DEFAULT_STATUS_URL: &str = "https://app.koyeb.com/v1/account/profile";

/// Outcome of the primary status-API call.
///
/// Transport failures, non-2xx responses, and unreadable 2xx bodies are all
/// folded into data; the orchestrator decides what they mean for the run.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusOutcome {
    /// 2xx response; `email` is the display field from the profile body.
    Verified { email: String },
    /// Non-2xx response.
    Rejected { status: u16, reason: String },
    /// The request errored before a usable response existed.
    Failed { message: String },
}

/// Outcome of the optional app ping. Informational only; a non-2xx status
/// still counts as "responded".
#[derive(Debug, Clone, PartialEq)]
pub enum PingOutcome {
    Responded { status: u16 },
    Failed { message: String },
}

/// The two outbound calls a keep-alive run makes per account.
#[async_trait]
pub trait PlatformProbe: Send + Sync {
    /// Call the account-status endpoint with a bearer token.
    async fn account_status(&self, token: &str) -> StatusOutcome;

    /// Best-effort GET against the account's app URL.
    async fn app_ping(&self, url: &str) -> PingOutcome;
}

/// reqwest-backed probe against the real platform.
///
/// No explicit timeout is set; calls run on the transport's defaults, and a
/// run is never cancelled mid-flight.
pub struct HttpPlatformProbe {
    client: Client,
    status_url: String,
}

impl HttpPlatformProbe {
    pub fn new(status_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            status_url: status_url.into(),
        }
    }
}

impl Default for HttpPlatformProbe {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_URL)
    }
}

#[async_trait]
impl PlatformProbe for HttpPlatformProbe {
    async fn account_status(&self, token: &str) -> StatusOutcome {
        let result = self
            .client
            .get(&self.status_url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    // An unreadable body on a 2xx is still a failed check.
                    match response.json::<Value>().await {
                        Ok(body) => StatusOutcome::Verified {
                            email: body
                                .pointer("/user/email")
                                .and_then(Value::as_str)
                                .unwrap_or("Unknown")
                                .to_string(),
                        },
                        Err(err) => StatusOutcome::Failed {
                            message: err.to_string(),
                        },
                    }
                } else {
                    StatusOutcome::Rejected {
                        status: status.as_u16(),
                        reason: status.canonical_reason().unwrap_or("").to_string(),
                    }
                }
            }
            Err(err) => StatusOutcome::Failed {
                message: err.to_string(),
            },
        }
    }

    async fn app_ping(&self, url: &str) -> PingOutcome {
        match self.client.get(url).send().await {
            Ok(response) => PingOutcome::Responded {
                status: response.status().as_u16(),
            },
            Err(err) => PingOutcome::Failed {
                message: err.to_string(),
            },
        }
    }
}

//! Integration tests for EdgeStack server.
//!
//! These tests require a running EdgeStack server at `localhost:8080`.
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p edgestack-integration -- --ignored
//! ```

use std::sync::Once;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("EDGESTACK_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:8080".to_owned())
}

/// HTTP client for the local server.
#[must_use]
pub fn client() -> reqwest::Client {
    init_tracing();
    reqwest::Client::new()
}

/// Origin-request event envelope carrying `body` as base64.
#[must_use]
pub fn origin_request_event(uri: &str, body: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "Records": [{
            "cf": {
                "config": {
                    "distributionId": "EDFDVBD6EXAMPLE",
                    "eventType": "origin-request",
                    "requestId": "integration"
                },
                "request": {
                    "clientIp": "203.0.113.178",
                    "method": "POST",
                    "uri": uri,
                    "querystring": "",
                    "headers": {
                        "host": [{ "key": "Host", "value": "origin.example.com" }],
                        "content-type": [{ "key": "Content-Type", "value": "application/json" }]
                    },
                    "body": {
                        "inputTruncated": false,
                        "action": "read-only",
                        "encoding": "base64",
                        "data": BASE64_STANDARD.encode(body)
                    }
                }
            }
        }]
    })
}

/// Invoke the edge interceptor with `event`.
pub async fn invoke_edge(
    client: &reqwest::Client,
    event: &serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/edge/origin-request", endpoint_url()))
        .json(event)
        .send()
        .await
        .unwrap_or_else(|e| panic!("edge invocation failed: {e}"))
}

mod test_edge;
mod test_health;
mod test_origin;

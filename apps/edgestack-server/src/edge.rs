//! Edge invocation endpoint.
//!
//! `POST /edge/origin-request` takes an edge event envelope, runs the
//! [`ContentDigestInterceptor`] over it, and answers with the request the
//! delivery layer should forward to the origin.

use std::error::Error as StdError;

use bytes::Bytes;
use edgestack_edge::{ContentDigestInterceptor, InterceptError};
use hyper::body::Incoming;
use tracing::warn;

use crate::service::{
    GatewayBody, RouterFuture, ServiceRouter, collect_limited, error_response, json_response,
};

/// Path the delivery layer invokes the interceptor on.
pub const EDGE_INVOKE_PATH: &str = "/edge/origin-request";

/// Room for the envelope around a base64 body (headers, config, URI).
const ENVELOPE_OVERHEAD: usize = 64 * 1024;

/// Largest event accepted for a decoded body limit of `max_body_bytes`.
///
/// Base64 grows the body by 4/3; anything beyond this can only be a body the
/// interceptor would reject anyway.
#[must_use]
pub fn event_size_limit(max_body_bytes: usize) -> usize {
    max_body_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(ENVELOPE_OVERHEAD)
}

fn status_for(err: &InterceptError) -> http::StatusCode {
    match err {
        InterceptError::BodyTooLarge { .. } => http::StatusCode::PAYLOAD_TOO_LARGE,
        _ => http::StatusCode::BAD_REQUEST,
    }
}

/// Run the interceptor over an event carried in `req`'s body.
pub async fn handle_edge_request<B>(
    interceptor: &ContentDigestInterceptor,
    req: http::Request<B>,
) -> http::Response<GatewayBody>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let limit = event_size_limit(interceptor.config().max_body_bytes);
    let raw = match collect_limited(req.into_body(), limit).await {
        Ok(raw) => raw,
        Err(e) => return e.into_response(),
    };

    match interceptor.handle_event_json(&raw) {
        Ok(request) => json_response(http::StatusCode::OK, &request),
        Err(e) => {
            warn!(code = e.code(), error = %e, "rejected edge request");
            error_response(status_for(&e), e.code(), &e.to_string())
        }
    }
}

/// Routes edge invocations to the interceptor.
#[derive(Debug, Clone)]
pub struct EdgeRouter {
    interceptor: ContentDigestInterceptor,
}

impl EdgeRouter {
    /// Wrap an interceptor in a router.
    pub fn new(interceptor: ContentDigestInterceptor) -> Self {
        Self { interceptor }
    }
}

impl ServiceRouter for EdgeRouter {
    fn name(&self) -> &'static str {
        "edge"
    }

    fn matches(&self, method: &http::Method, uri: &http::Uri) -> bool {
        *method == http::Method::POST && uri.path() == EDGE_INVOKE_PATH
    }

    fn call(&self, req: http::Request<Incoming>) -> RouterFuture {
        let interceptor = self.interceptor.clone();
        Box::pin(async move { Ok(handle_edge_request(&interceptor, req).await) })
    }
}

#[cfg(test)]
mod tests {
    use edgestack_edge::{EdgeEvent, EdgeRequest, InterceptorConfig, RequestBody};
    use http_body_util::{BodyExt, Full};

    use super::*;

    fn post(body: impl Into<Bytes>) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method(http::Method::POST)
            .uri(EDGE_INVOKE_PATH)
            .body(Full::new(body.into()))
            .unwrap()
    }

    async fn json_body(resp: http::Response<GatewayBody>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_should_inject_digest_into_forwarded_request() {
        let event = EdgeEvent::origin_request(
            EdgeRequest::new("POST", "/count").with_body(RequestBody::base64(b"{\"count\":10}")),
        );
        let resp = handle_edge_request(
            &ContentDigestInterceptor::default(),
            post(serde_json::to_vec(&event).unwrap()),
        )
        .await;

        assert_eq!(resp.status(), http::StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(
            json["headers"]["x-content-sha256"][0]["value"],
            "4c9caa2c9fbb5e5f0099ac08ff7a74fd9c6711d307d1e88705cb791b157d3404"
        );
        assert_eq!(json["uri"], "/count");
    }

    #[tokio::test]
    async fn test_should_reject_malformed_encoding_with_bad_request() {
        let event = r#"{"Records":[{"cf":{"config":{"eventType":"origin-request"},
            "request":{"method":"POST","uri":"/","querystring":"","headers":{},
            "body":{"inputTruncated":false,"action":"read-only","encoding":"base64","data":"***"}}}}]}"#;
        let resp = handle_edge_request(&ContentDigestInterceptor::default(), post(event)).await;
        assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "MalformedBodyEncoding");
    }

    #[tokio::test]
    async fn test_should_reject_oversized_body_with_payload_too_large() {
        let interceptor =
            ContentDigestInterceptor::new(InterceptorConfig::builder().max_body_bytes(8).build());
        let event = EdgeEvent::origin_request(
            EdgeRequest::new("POST", "/").with_body(RequestBody::base64(&[7_u8; 32])),
        );
        let body = serde_json::to_vec(&event).unwrap();
        let resp = handle_edge_request(&interceptor, post(body)).await;
        assert_eq!(resp.status(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_should_reject_garbage_event() {
        let interceptor = ContentDigestInterceptor::default();
        let resp = handle_edge_request(&interceptor, post("not json")).await;
        assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "InvalidEvent");
    }

    #[test]
    fn test_should_match_only_post_on_invoke_path() {
        let router = EdgeRouter::new(ContentDigestInterceptor::default());
        let uri: http::Uri = EDGE_INVOKE_PATH.parse().unwrap();
        assert!(router.matches(&http::Method::POST, &uri));
        assert!(!router.matches(&http::Method::GET, &uri));
        assert!(!router.matches(&http::Method::POST, &"/other".parse().unwrap()));
    }

    #[test]
    fn test_should_size_event_limit_for_base64_body() {
        assert_eq!(event_size_limit(3), 4 + 64 * 1024);
        assert!(event_size_limit(1_048_576) > 1_048_576 * 4 / 3);
    }
}

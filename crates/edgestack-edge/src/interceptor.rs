//! The content-digest interceptor.

use std::sync::Arc;

use edgestack_auth::{CONTENT_SHA256_HEADER, compute_digest};
use tracing::{debug, info};

use crate::config::InterceptorConfig;
use crate::error::InterceptError;
use crate::event::{EdgeEvent, EdgeRequest, EventConfig};

/// Injects the body digest into every request that carries a body.
///
/// The interceptor holds only immutable configuration, so one instance can
/// serve any number of concurrent requests.
///
/// # Examples
///
/// ```
/// use edgestack_edge::{ContentDigestInterceptor, EdgeRequest, InterceptorConfig, RequestBody};
///
/// let interceptor = ContentDigestInterceptor::new(InterceptorConfig::default());
/// let request = EdgeRequest::new("POST", "/sse").with_body(RequestBody::base64(br#"{"count":10}"#));
///
/// let request = interceptor.intercept(request).unwrap();
/// assert_eq!(
///     request.headers.first_value("x-content-sha256"),
///     Some("4c9caa2c9fbb5e5f0099ac08ff7a74fd9c6711d307d1e88705cb791b157d3404"),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContentDigestInterceptor {
    config: Arc<InterceptorConfig>,
}

impl ContentDigestInterceptor {
    /// Create an interceptor with the given configuration.
    #[must_use]
    pub fn new(config: InterceptorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the interceptor configuration.
    #[must_use]
    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Parse a raw event envelope and intercept its request.
    ///
    /// # Errors
    ///
    /// Returns [`InterceptError::InvalidEvent`] for unparseable input, plus
    /// anything [`handle_event`](Self::handle_event) returns.
    pub fn handle_event_json(&self, raw: &[u8]) -> Result<EdgeRequest, InterceptError> {
        let event: EdgeEvent = serde_json::from_slice(raw)?;
        self.handle_event(event)
    }

    /// Intercept the request carried by an event envelope.
    ///
    /// # Errors
    ///
    /// Returns [`InterceptError::MissingRecord`] for an empty envelope,
    /// [`InterceptError::UnsupportedEventType`] for response events, plus
    /// anything [`intercept`](Self::intercept) returns.
    pub fn handle_event(&self, event: EdgeEvent) -> Result<EdgeRequest, InterceptError> {
        let record = event
            .records
            .into_iter()
            .next()
            .ok_or(InterceptError::MissingRecord)?;
        let EventConfig {
            event_type,
            distribution_id,
            request_id,
            ..
        } = record.cf.config;

        if !event_type.is_request() {
            return Err(InterceptError::UnsupportedEventType(event_type.to_string()));
        }

        debug!(
            event_type = %event_type,
            distribution_id = distribution_id.as_deref().unwrap_or("-"),
            request_id = request_id.as_deref().unwrap_or("-"),
            "handling edge event"
        );
        self.intercept(record.cf.request)
    }

    /// Inject the digest header into `request`.
    ///
    /// Requests without a body, or with an empty one, are returned unchanged.
    /// Otherwise the body is decoded, hashed, and the digest replaces any
    /// existing digest header. Method, URI, query string and body are never
    /// touched. Running this twice yields the same single header value.
    ///
    /// # Errors
    ///
    /// Returns [`InterceptError::BodyTruncated`] for truncated bodies,
    /// [`InterceptError::BodyTooLarge`] for bodies above the configured limit,
    /// and [`InterceptError::MalformedBodyEncoding`] for undecodable data.
    pub fn intercept(&self, mut request: EdgeRequest) -> Result<EdgeRequest, InterceptError> {
        self.log_payload("original request", &request);

        let Some(body) = request.body.as_ref().filter(|b| !b.is_empty()) else {
            debug!(method = %request.method, uri = %request.uri, "no body, passing through");
            return Ok(request);
        };

        if body.input_truncated {
            return Err(InterceptError::BodyTruncated);
        }

        let limit = self.config.max_body_bytes;
        let size = body.decoded_len();
        if size > limit {
            return Err(InterceptError::BodyTooLarge { size, limit });
        }

        let bytes = body.decode()?;
        if bytes.len() > limit {
            return Err(InterceptError::BodyTooLarge {
                size: bytes.len(),
                limit,
            });
        }
        let digest = compute_digest(&bytes);
        let body_len = bytes.len();

        request
            .headers
            .set_single(CONTENT_SHA256_HEADER, digest.as_str());

        info!(
            method = %request.method,
            uri = %request.uri,
            body_len,
            headers = request.headers.len(),
            digest = %digest,
            "injected content digest"
        );
        self.log_payload("modified request", &request);

        Ok(request)
    }

    fn log_payload(&self, stage: &str, request: &EdgeRequest) {
        if !self.config.log_payloads {
            return;
        }
        match serde_json::to_string(request) {
            Ok(payload) => debug!(stage, %payload, "edge request payload"),
            Err(e) => debug!(stage, error = %e, "edge request payload not serializable"),
        }
    }
}

//! Edge event model.
//!
//! Mirrors the origin-request event the delivery layer sends:
//!
//! ```json
//! {
//!   "Records": [{
//!     "cf": {
//!       "config": { "distributionId": "EDFDVBD6EXAMPLE", "eventType": "origin-request", "requestId": "..." },
//!       "request": {
//!         "clientIp": "203.0.113.178",
//!         "method": "POST",
//!         "uri": "/sse",
//!         "querystring": "",
//!         "headers": { "host": [{ "key": "Host", "value": "d111111abcdef8.cloudfront.net" }] },
//!         "body": { "inputTruncated": false, "action": "read-only", "encoding": "base64", "data": "eyJjb3VudCI6MTB9" }
//!       }
//!     }
//!   }]
//! }
//! ```
//!
//! Request fields the interceptor does not model (`clientIp`, `origin`, ...)
//! are carried through verbatim.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The event envelope handed to an edge function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEvent {
    /// Event records; the delivery layer sends exactly one.
    #[serde(rename = "Records")]
    pub records: Vec<EdgeRecord>,
}

impl EdgeEvent {
    /// Wrap a single request in an origin-request envelope.
    #[must_use]
    pub fn origin_request(request: EdgeRequest) -> Self {
        Self {
            records: vec![EdgeRecord {
                cf: CfPayload {
                    config: EventConfig::default(),
                    request,
                },
            }],
        }
    }
}

/// One record of an [`EdgeEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Delivery-layer payload.
    pub cf: CfPayload,
}

/// Delivery-layer payload: distribution metadata plus the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfPayload {
    /// Metadata identifying where the event came from.
    #[serde(default)]
    pub config: EventConfig,
    /// The request being intercepted.
    pub request: EdgeRequest,
}

/// Event-origin metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConfig {
    /// Domain name of the distribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_domain_name: Option<String>,
    /// Distribution identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
    /// Which interception point raised the event.
    #[serde(default)]
    pub event_type: EventType,
    /// Delivery-layer request identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Interception points of the delivery path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// Before the cache is consulted.
    ViewerRequest,
    /// Before the request is forwarded to the origin.
    #[default]
    OriginRequest,
    /// After the origin responds.
    OriginResponse,
    /// Before the response is returned to the viewer.
    ViewerResponse,
}

impl EventType {
    /// Kebab-case name as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewerRequest => "viewer-request",
            Self::OriginRequest => "origin-request",
            Self::OriginResponse => "origin-response",
            Self::ViewerResponse => "viewer-response",
        }
    }

    /// Whether the event carries a request (and so possibly a body).
    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Self::ViewerRequest | Self::OriginRequest)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A request as seen at the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub uri: String,
    /// Raw query string without the leading `?`.
    #[serde(default)]
    pub querystring: String,
    /// Request headers, keyed by lowercase name.
    #[serde(default)]
    pub headers: HeaderMap,
    /// Request body, when the delivery layer exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    /// Fields carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EdgeRequest {
    /// Create a request with no headers and no body.
    #[must_use]
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            querystring: String::new(),
            headers: HeaderMap::new(),
            body: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Attach a body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a header value.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// One header value together with its original-case name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name as the client sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Header value.
    pub value: String,
}

/// Header multimap keyed by lowercase header name.
///
/// Every way of building a `HeaderMap` normalizes names, so `Content-Type`
/// and `content-type` can never coexist as separate entries. Values of names
/// that collapse together keep their relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Vec<HeaderEntry>>",
    into = "BTreeMap<String, Vec<HeaderEntry>>"
)]
pub struct HeaderMap(BTreeMap<String, Vec<HeaderEntry>>);

impl HeaderMap {
    /// Create an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All values for `name`, matched case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[HeaderEntry]> {
        self.0.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    /// The first value for `name`, matched case-insensitively.
    #[must_use]
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(<[HeaderEntry]>::first)
            .map(|entry| entry.value.as_str())
    }

    /// Append a value, keeping `name` as the entry's original-case key.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(HeaderEntry {
                key: Some(name.to_owned()),
                value: value.into(),
            });
    }

    /// Replace every value of `name` with a single value keyed by the lowercase name.
    pub fn set_single(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let entry = HeaderEntry {
            key: Some(name.clone()),
            value: value.into(),
        };
        self.0.insert(name, vec![entry]);
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (lowercase name, values) in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[HeaderEntry])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl From<BTreeMap<String, Vec<HeaderEntry>>> for HeaderMap {
    fn from(raw: BTreeMap<String, Vec<HeaderEntry>>) -> Self {
        let mut map: BTreeMap<String, Vec<HeaderEntry>> = BTreeMap::new();
        for (name, entries) in raw {
            map.entry(name.to_ascii_lowercase())
                .or_default()
                .extend(entries);
        }
        Self(map)
    }
}

impl From<HeaderMap> for BTreeMap<String, Vec<HeaderEntry>> {
    fn from(headers: HeaderMap) -> Self {
        headers.0
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// How the delivery layer encoded the body data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// Standard base64 with padding.
    Base64,
    /// Plain UTF-8 text, no transport encoding.
    #[serde(alias = "none")]
    Text,
}

/// Whether the edge function may replace the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyAction {
    /// The body is passed through as received.
    #[default]
    ReadOnly,
    /// The function supplies a replacement body.
    Replace,
}

/// A request body as exposed to the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    /// The delivery layer cut the body at its size cap.
    #[serde(default)]
    pub input_truncated: bool,
    /// Body action.
    #[serde(default)]
    pub action: BodyAction,
    /// Transport encoding of `data`.
    pub encoding: BodyEncoding,
    /// Encoded body data.
    #[serde(default)]
    pub data: String,
}

impl RequestBody {
    /// A base64-encoded body holding `bytes`.
    #[must_use]
    pub fn base64(bytes: &[u8]) -> Self {
        Self {
            input_truncated: false,
            action: BodyAction::ReadOnly,
            encoding: BodyEncoding::Base64,
            data: BASE64_STANDARD.encode(bytes),
        }
    }

    /// A plain-text body.
    #[must_use]
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            input_truncated: false,
            action: BodyAction::ReadOnly,
            encoding: BodyEncoding::Text,
            data: data.into(),
        }
    }

    /// Whether the body carries no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the decoded body, computed without decoding.
    ///
    /// Exact for well-formed data; malformed base64 is caught by [`decode`](Self::decode).
    #[must_use]
    pub fn decoded_len(&self) -> usize {
        match self.encoding {
            BodyEncoding::Base64 => self.data.trim_end_matches('=').len() * 3 / 4,
            BodyEncoding::Text => self.data.len(),
        }
    }

    /// Decode the body to the exact bytes the client sent.
    ///
    /// # Errors
    ///
    /// Returns a [`base64::DecodeError`] if base64 data is malformed.
    pub fn decode(&self) -> Result<Cow<'_, [u8]>, base64::DecodeError> {
        match self.encoding {
            BodyEncoding::Base64 => BASE64_STANDARD.decode(&self.data).map(Cow::Owned),
            BodyEncoding::Text => Ok(Cow::Borrowed(self.data.as_bytes())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_EVENT: &str = r#"{
        "Records": [{
            "cf": {
                "config": {
                    "distributionDomainName": "d111111abcdef8.cloudfront.net",
                    "distributionId": "EDFDVBD6EXAMPLE",
                    "eventType": "origin-request",
                    "requestId": "4TyzHTaYWb1GX1qTfsHhEqV6HUDd_BzoBZnwfnvQc_1oF26ClkoUSEQ=="
                },
                "request": {
                    "clientIp": "203.0.113.178",
                    "method": "POST",
                    "uri": "/sse",
                    "querystring": "",
                    "headers": {
                        "host": [{"key": "Host", "value": "d111111abcdef8.cloudfront.net"}],
                        "Content-Type": [{"key": "Content-Type", "value": "application/json"}]
                    },
                    "body": {
                        "inputTruncated": false,
                        "action": "read-only",
                        "encoding": "base64",
                        "data": "eyJjb3VudCI6MTB9"
                    },
                    "origin": {"custom": {"domainName": "fn.lambda-url.ap-northeast-1.on.aws"}}
                }
            }
        }]
    }"#;

    #[test]
    fn test_should_parse_origin_request_event() {
        let event: EdgeEvent = serde_json::from_str(SAMPLE_EVENT).unwrap();
        let payload = &event.records[0].cf;
        assert_eq!(payload.config.event_type, EventType::OriginRequest);
        assert_eq!(payload.config.distribution_id.as_deref(), Some("EDFDVBD6EXAMPLE"));

        let request = &payload.request;
        assert_eq!(request.method, "POST");
        assert_eq!(request.uri, "/sse");
        assert_eq!(request.headers.first_value("content-type"), Some("application/json"));
        assert!(request.extra.contains_key("clientIp"));
        assert!(request.extra.contains_key("origin"));

        let body = request.body.as_ref().unwrap();
        assert_eq!(body.encoding, BodyEncoding::Base64);
        assert_eq!(body.decode().unwrap().as_ref(), br#"{"count":10}"#);
    }

    #[test]
    fn test_should_preserve_unmodelled_fields_on_reserialize() {
        let event: EdgeEvent = serde_json::from_str(SAMPLE_EVENT).unwrap();
        let json = serde_json::to_value(&event.records[0].cf.request).unwrap();
        assert_eq!(json["clientIp"], "203.0.113.178");
        assert_eq!(
            json["origin"]["custom"]["domainName"],
            "fn.lambda-url.ap-northeast-1.on.aws"
        );
        assert_eq!(json["body"]["action"], "read-only");
    }

    #[test]
    fn test_should_merge_header_names_differing_only_in_case() {
        let raw = r#"{
            "X-Trace": [{"key": "X-Trace", "value": "a"}],
            "x-trace": [{"key": "x-trace", "value": "b"}]
        }"#;
        let headers: HeaderMap = serde_json::from_str(raw).unwrap();
        assert_eq!(headers.len(), 1);
        let values: Vec<&str> = headers
            .get("X-TRACE")
            .unwrap()
            .iter()
            .map(|e| e.value.as_str())
            .collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_should_replace_all_values_with_set_single() {
        let mut headers = HeaderMap::new();
        headers.append("X-Content-SHA256", "stale");
        headers.append("x-content-sha256", "also-stale");
        headers.set_single("X-Content-Sha256", "fresh");

        let entries = headers.get("x-content-sha256").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key.as_deref(), Some("x-content-sha256"));
        assert_eq!(entries[0].value, "fresh");
    }

    #[test]
    fn test_should_accept_none_as_text_encoding_alias() {
        let body: RequestBody =
            serde_json::from_str(r#"{"encoding": "none", "data": "{\"count\":10}"}"#).unwrap();
        assert_eq!(body.encoding, BodyEncoding::Text);
        assert_eq!(body.action, BodyAction::ReadOnly);
        assert!(!body.input_truncated);
        assert_eq!(body.decode().unwrap().as_ref(), br#"{"count":10}"#);
    }

    #[test]
    fn test_should_require_explicit_body_encoding() {
        let result = serde_json::from_str::<RequestBody>(r#"{"data": "abc"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_should_report_decoded_length_without_decoding() {
        assert_eq!(RequestBody::base64(b"hello").decoded_len(), 5);
        assert_eq!(RequestBody::base64(b"").decoded_len(), 0);
        assert_eq!(RequestBody::base64(&[0u8; 1024]).decoded_len(), 1024);
        assert_eq!(RequestBody::text("abc").decoded_len(), 3);
    }

    #[test]
    fn test_should_reject_malformed_base64() {
        let body = RequestBody {
            input_truncated: false,
            action: BodyAction::ReadOnly,
            encoding: BodyEncoding::Base64,
            data: "not base64!".to_owned(),
        };
        assert!(body.decode().is_err());
    }

    #[test]
    fn test_should_classify_request_events() {
        assert!(EventType::OriginRequest.is_request());
        assert!(EventType::ViewerRequest.is_request());
        assert!(!EventType::OriginResponse.is_request());
        assert_eq!(EventType::ViewerResponse.to_string(), "viewer-response");
    }
}

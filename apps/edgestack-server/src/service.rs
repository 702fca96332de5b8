//! Service router abstraction for the gateway.
//!
//! Each hosted component (the edge interceptor, the origin) implements
//! [`ServiceRouter`] to declare which requests it claims and how it handles
//! them. The gateway holds a list of routers and dispatches to the first match.
//!
//! [`GatewayBody`] is a type-erased HTTP response body shared by all routers.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use serde::Serialize;

/// Type-erased response body used by the gateway.
pub type GatewayBody = BoxBody<Bytes, io::Error>;

/// Boxed future returned by [`ServiceRouter::call`].
pub type RouterFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<GatewayBody>, Infallible>> + Send>>;

/// Create a [`GatewayBody`] from a string.
pub fn gateway_body_from_string(s: impl Into<String>) -> GatewayBody {
    Full::new(Bytes::from(s.into()))
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// Serialize `value` into a JSON response with the given status.
pub fn json_response<T: Serialize>(
    status: http::StatusCode,
    value: &T,
) -> http::Response<GatewayBody> {
    match serde_json::to_string(value) {
        Ok(body) => http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(gateway_body_from_string(body))
            .expect("static response parts should be valid"),
        Err(e) => error_response(
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "InternalError",
            &e.to_string(),
        ),
    }
}

/// JSON error response: `{"error": code, "message": message}`.
pub fn error_response(
    status: http::StatusCode,
    code: &str,
    message: &str,
) -> http::Response<GatewayBody> {
    let body = serde_json::json!({ "error": code, "message": message }).to_string();
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(gateway_body_from_string(body))
        .expect("static response parts should be valid")
}

/// Failure to read a request body.
#[derive(Debug)]
pub enum BodyReadError {
    /// The body is longer than the limit.
    TooLarge {
        /// Limit in bytes.
        limit: usize,
    },
    /// The connection failed mid-body.
    Read(String),
}

impl BodyReadError {
    /// Response reporting this failure to the client.
    pub fn into_response(self) -> http::Response<GatewayBody> {
        match self {
            Self::TooLarge { limit } => error_response(
                http::StatusCode::PAYLOAD_TOO_LARGE,
                "BodyTooLarge",
                &format!("request body exceeds the {limit} byte limit"),
            ),
            Self::Read(message) => {
                error_response(http::StatusCode::BAD_REQUEST, "BodyReadFailed", &message)
            }
        }
    }
}

/// Collect at most `limit` bytes of `body`.
///
/// # Errors
///
/// [`BodyReadError::TooLarge`] once the body passes `limit`, and
/// [`BodyReadError::Read`] for transport failures.
pub async fn collect_limited<B>(body: B, limit: usize) -> Result<Bytes, BodyReadError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(BodyReadError::TooLarge { limit })
        }
        Err(e) => Err(BodyReadError::Read(e.to_string())),
    }
}

/// A component registered with the gateway.
///
/// Implementors declare which requests they handle (via [`matches`](ServiceRouter::matches))
/// and how to process them (via [`call`](ServiceRouter::call)).
pub trait ServiceRouter: Send + Sync {
    /// Name for health reporting (e.g., `"edge"`, `"origin"`).
    fn name(&self) -> &'static str;

    /// Returns `true` if this router should handle a request with this method and URI.
    fn matches(&self, method: &http::Method, uri: &http::Uri) -> bool;

    /// Handle the request, producing a response with a type-erased body.
    fn call(&self, req: http::Request<Incoming>) -> RouterFuture;
}

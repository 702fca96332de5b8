//! Signature-verifying origin.
//!
//! Stands in for the backend behind the edge: every request that is not an
//! edge invocation or a health probe is checked with [`OriginVerifier`] and
//! answered with the digest it verified.

use std::error::Error as StdError;

use bytes::Bytes;
use edgestack_auth::OriginVerifier;
use hyper::body::Incoming;
use serde::Serialize;
use tracing::{info, warn};

use crate::service::{
    GatewayBody, RouterFuture, ServiceRouter, collect_limited, error_response, json_response,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifiedResponse<'a> {
    digest: &'a str,
    body_length: usize,
    signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_key_id: Option<&'a str>,
}

/// Verify `req` and report the outcome.
///
/// Answers 200 with the verified digest, 403 when the digest or signature does
/// not check out, and 413 when the body exceeds `body_limit`.
pub async fn handle_origin_request<B>(
    verifier: &OriginVerifier,
    body_limit: usize,
    req: http::Request<B>,
) -> http::Response<GatewayBody>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let body = match collect_limited(body, body_limit).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    match verifier.verify(&parts, &body) {
        Ok(verified) => {
            info!(
                method = %parts.method,
                path = parts.uri.path(),
                digest = %verified.digest,
                signed = verified.auth.is_some(),
                "origin accepted request"
            );
            json_response(
                http::StatusCode::OK,
                &VerifiedResponse {
                    digest: verified.digest.as_str(),
                    body_length: body.len(),
                    signed: verified.auth.is_some(),
                    access_key_id: verified.auth.as_ref().map(|a| a.access_key_id.as_str()),
                },
            )
        }
        Err(e) => {
            warn!(
                method = %parts.method,
                path = parts.uri.path(),
                code = e.code(),
                error = %e,
                "origin rejected request"
            );
            error_response(http::StatusCode::FORBIDDEN, e.code(), &e.to_string())
        }
    }
}

/// Catch-all router for the origin. Register it last.
#[derive(Debug, Clone)]
pub struct OriginRouter {
    verifier: OriginVerifier,
    body_limit: usize,
}

impl OriginRouter {
    /// Create a router verifying with `verifier`, reading at most `body_limit` bytes.
    pub fn new(verifier: OriginVerifier, body_limit: usize) -> Self {
        Self {
            verifier,
            body_limit,
        }
    }
}

impl ServiceRouter for OriginRouter {
    fn name(&self) -> &'static str {
        "origin"
    }

    /// The origin is the default service and matches every request.
    fn matches(&self, _method: &http::Method, _uri: &http::Uri) -> bool {
        true
    }

    fn call(&self, req: http::Request<Incoming>) -> RouterFuture {
        let verifier = self.verifier.clone();
        let limit = self.body_limit;
        Box::pin(async move { Ok(handle_origin_request(&verifier, limit, req).await) })
    }
}

//! Edge request interceptor for EdgeStack.
//!
//! The content-delivery layer invokes [`ContentDigestInterceptor`] once per
//! inbound request, before the request is dispatched to the origin. The
//! interceptor decodes the request body, computes its SHA-256 digest and
//! injects it as the single-valued `x-content-sha256` header. The origin
//! re-verifies that digest as part of its signature check, so any failure
//! here rejects the request instead of forwarding it.
//!
//! The event types in [`event`] mirror the origin-request event envelope the
//! delivery layer sends, with an explicit tagged body encoding so the
//! interceptor can be exercised without the platform.

pub mod config;
pub mod error;
pub mod event;
pub mod interceptor;

pub use config::InterceptorConfig;
pub use error::InterceptError;
pub use event::{
    BodyAction, BodyEncoding, EdgeEvent, EdgeRequest, EventConfig, EventType, HeaderEntry,
    HeaderMap, RequestBody,
};
pub use interceptor::ContentDigestInterceptor;

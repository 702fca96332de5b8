//! Errors raised while intercepting a request.
//!
//! Every variant is fatal for the request: the delivery layer must reject it
//! rather than forward a body the origin cannot verify.

/// Errors that stop a request at the edge.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    /// The event envelope could not be parsed.
    #[error("invalid edge event: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    /// The event envelope contains no records.
    #[error("edge event contains no records")]
    MissingRecord,

    /// The event is not a request event, so there is no body to digest.
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// The body is marked base64 but does not decode.
    #[error("malformed body encoding: {0}")]
    MalformedBodyEncoding(#[from] base64::DecodeError),

    /// The delivery layer truncated the body, so its digest cannot match the origin's.
    #[error("request body was truncated by the delivery layer")]
    BodyTruncated,

    /// The body exceeds the configured maximum.
    #[error("request body of {size} bytes exceeds the {limit} byte limit")]
    BodyTooLarge {
        /// Observed (or lower-bound estimated) size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}

impl InterceptError {
    /// Stable machine-readable code for responses and logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEvent(_) => "InvalidEvent",
            Self::MissingRecord => "MissingRecord",
            Self::UnsupportedEventType(_) => "UnsupportedEventType",
            Self::MalformedBodyEncoding(_) => "MalformedBodyEncoding",
            Self::BodyTruncated => "BodyTruncated",
            Self::BodyTooLarge { .. } => "BodyTooLarge",
        }
    }
}

//! Error types for digest and signature verification.

/// Errors that can occur while verifying a request at the origin.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is missing from the request.
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// The signing algorithm is not supported (only AWS4-HMAC-SHA256 is supported).
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A required HTTP header referenced in `SignedHeaders` is missing.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The `Credential` component does not match the expected format
    /// (`AKID/date/region/service/aws4_request`).
    #[error("Invalid credential format")]
    InvalidCredential,

    /// The access key ID was not found in the credential store.
    #[error("Access key not found: {0}")]
    AccessKeyNotFound(String),

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,

    /// A digest header value is not 64 lowercase hex characters.
    #[error("Invalid content digest: {0}")]
    InvalidDigest(String),

    /// The request has a body but carries no digest header.
    #[error("Missing content digest header: {0}")]
    MissingDigest(String),

    /// The digest header does not match the digest of the received body.
    #[error("Content digest mismatch: header {provided}, body {computed}")]
    DigestMismatch {
        /// Digest carried by the request.
        provided: String,
        /// Digest of the body as received.
        computed: String,
    },

    /// The digest header is present more than once.
    #[error("Content digest header {0} must have exactly one value")]
    AmbiguousDigest(String),

    /// A signed request with a body does not sign the digest header.
    #[error("Content digest header {0} is not covered by the signature")]
    DigestNotSigned(String),
}

impl AuthError {
    /// Stable machine-readable code for responses and logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAuthHeader => "MissingAuthenticationToken",
            Self::InvalidAuthHeader | Self::InvalidCredential => "IncompleteSignature",
            Self::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            Self::MissingHeader(_) => "MissingHeader",
            Self::AccessKeyNotFound(_) => "InvalidAccessKeyId",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::InvalidDigest(_) => "InvalidDigest",
            Self::MissingDigest(_) => "MissingDigest",
            Self::DigestMismatch { .. } => "XAmzContentSHA256Mismatch",
            Self::AmbiguousDigest(_) => "AmbiguousDigest",
            Self::DigestNotSigned(_) => "DigestNotSigned",
        }
    }
}

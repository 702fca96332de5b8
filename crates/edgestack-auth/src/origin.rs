//! Origin-side verification of edge-injected digests.
//!
//! The origin trusts nothing the edge says about the body: it recomputes the
//! digest of the bytes it actually received and compares it, in constant
//! time, with the `x-content-sha256` header. With credentials configured it
//! then checks the SigV4 signature that binds that header.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::credentials::CredentialProvider;
use crate::digest::{CONTENT_SHA256_HEADER, ContentDigest, compute_digest};
use crate::error::AuthError;
use crate::sigv4::{AuthResult, verify_sigv4};

/// Outcome of a successful origin verification.
#[derive(Debug, Clone)]
pub struct OriginVerification {
    /// Digest of the received body.
    pub digest: ContentDigest,
    /// Whether the request carried a digest header.
    pub digest_header_present: bool,
    /// Signature details, when signature verification is enabled.
    pub auth: Option<AuthResult>,
}

/// Verifies digests (and optionally signatures) of requests arriving at the origin.
#[derive(Clone, Default)]
pub struct OriginVerifier {
    credential_provider: Option<Arc<dyn CredentialProvider>>,
}

impl std::fmt::Debug for OriginVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginVerifier")
            .field(
                "credential_provider",
                &self.credential_provider.as_ref().map(|_| "..."),
            )
            .finish()
    }
}

impl OriginVerifier {
    /// Create a verifier. `None` disables signature checks and keeps digest checks.
    #[must_use]
    pub fn new(credential_provider: Option<Arc<dyn CredentialProvider>>) -> Self {
        Self {
            credential_provider,
        }
    }

    /// Whether SigV4 signatures are checked.
    #[must_use]
    pub fn verifies_signatures(&self) -> bool {
        self.credential_provider.is_some()
    }

    /// Verify a received request.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the digest header is missing for a non-empty
    /// body, malformed, repeated, or disagrees with the body, or if signature
    /// verification is enabled and fails.
    pub fn verify(
        &self,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> Result<OriginVerification, AuthError> {
        let digest = verify_content_digest(&parts.headers, body)?;
        let digest_header_present = parts.headers.contains_key(CONTENT_SHA256_HEADER);

        let auth = match &self.credential_provider {
            Some(provider) => Some(verify_sigv4(parts, provider.as_ref())?),
            None => None,
        };

        debug!(
            digest = %digest,
            digest_header_present,
            signed = auth.is_some(),
            "origin request verified"
        );
        Ok(OriginVerification {
            digest,
            digest_header_present,
            auth,
        })
    }
}

/// Check the digest header against `body` and return the body's digest.
///
/// A non-empty body requires exactly one digest header. An empty body may omit
/// the header, but if present it must equal the empty-payload digest.
///
/// # Errors
///
/// See [`OriginVerifier::verify`].
pub fn verify_content_digest(
    headers: &http::HeaderMap,
    body: &[u8],
) -> Result<ContentDigest, AuthError> {
    let computed = compute_digest(body);

    let mut values = headers.get_all(CONTENT_SHA256_HEADER).iter();
    let provided = match (values.next(), values.next()) {
        (None, _) if body.is_empty() => return Ok(computed),
        (None, _) => return Err(AuthError::MissingDigest(CONTENT_SHA256_HEADER.to_owned())),
        (Some(_), Some(_)) => {
            return Err(AuthError::AmbiguousDigest(CONTENT_SHA256_HEADER.to_owned()));
        }
        (Some(value), None) => value
            .to_str()
            .map_err(|_| AuthError::InvalidDigest("<non-ascii>".to_owned()))?
            .parse::<ContentDigest>()?,
    };

    if bool::from(provided.as_str().as_bytes().ct_eq(computed.as_str().as_bytes())) {
        Ok(computed)
    } else {
        Err(AuthError::DigestMismatch {
            provided: provided.into(),
            computed: computed.into(),
        })
    }
}

//! Content digests and request signing for EdgeStack.
//!
//! The edge computes a SHA-256 digest of every request body and attaches it
//! as the `x-content-sha256` header. The origin recomputes the digest, compares
//! it in constant time, and (when credentials are configured) verifies an AWS
//! Signature Version 4 `Authorization` header whose payload hash is that digest.
//!
//! # Modules
//!
//! - [`digest`] - The content digest type and the SHA-256 digest computer
//! - [`canonical`] - Canonical request construction per the SigV4 specification
//! - [`credentials`] - Credential provider trait and in-memory implementation
//! - [`error`] - Authentication error types
//! - [`origin`] - Origin-side digest and signature verification
//! - [`sigv4`] - SigV4 signing and verification keyed on the content digest

pub mod canonical;
pub mod credentials;
pub mod digest;
pub mod error;
pub mod origin;
pub mod sigv4;

pub use credentials::{CredentialProvider, StaticCredentialProvider};
pub use digest::{CONTENT_SHA256_HEADER, ContentDigest, compute_digest};
pub use error::AuthError;
pub use origin::{OriginVerification, OriginVerifier};
pub use sigv4::{AuthResult, SigningParams, sign_request, verify_sigv4};

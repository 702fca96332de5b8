//! AWS Signature Version 4 over the content digest.
//!
//! The edge signs each origin request the way origin access control does:
//! the signed headers always include `host` and `x-amz-date`, plus
//! `x-content-sha256` whenever that header is present, and the payload hash is
//! the digest header value (or the empty-payload digest for bodiless
//! requests). The origin reverses the process in [`verify_sigv4`].

use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{CanonicalRequest, signed_headers_string};
use crate::credentials::CredentialProvider;
use crate::digest::{CONTENT_SHA256_HEADER, ContentDigest};
use crate::error::AuthError;

/// The only algorithm supported by this implementation.
const SUPPORTED_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Header carrying the signing timestamp.
const AMZ_DATE_HEADER: &str = "x-amz-date";

type HmacSha256 = Hmac<Sha256>;

/// The result of a successful SigV4 verification.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The access key ID that signed the request.
    pub access_key_id: String,
    /// The AWS region from the credential scope.
    pub region: String,
    /// The AWS service from the credential scope.
    pub service: String,
    /// The headers covered by the signature.
    pub signed_headers: Vec<String>,
    /// The payload hash the signature binds.
    pub payload_hash: String,
}

/// Inputs for signing an origin request.
#[derive(Clone)]
pub struct SigningParams {
    /// Access key ID placed in the credential scope.
    pub access_key_id: String,
    /// Secret key used to derive the signing key.
    pub secret_key: String,
    /// Region of the origin.
    pub region: String,
    /// Service name of the origin (e.g. `lambda`).
    pub service: String,
    /// Signing time.
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Debug for SigningParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningParams")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Parsed components of a SigV4 `Authorization` header.
#[derive(Debug, Clone)]
pub struct ParsedAuth {
    /// The access key ID.
    pub access_key_id: String,
    /// The date component of the credential scope (YYYYMMDD).
    pub date: String,
    /// The AWS region from the credential scope.
    pub region: String,
    /// The AWS service from the credential scope.
    pub service: String,
    /// The signed header names (lowercase).
    pub signed_headers: Vec<String>,
    /// The hex-encoded signature.
    pub signature: String,
}

/// Parse a SigV4 `Authorization` header value.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] if the header format is invalid,
/// [`AuthError::UnsupportedAlgorithm`] for any algorithm other than
/// `AWS4-HMAC-SHA256`, or [`AuthError::InvalidCredential`] for a malformed scope.
pub fn parse_authorization_header(header: &str) -> Result<ParsedAuth, AuthError> {
    let (algorithm, rest) = header.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;
    if algorithm != SUPPORTED_ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;
    for part in rest.split(',').map(str::trim) {
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }
    let credential = credential.ok_or(AuthError::InvalidAuthHeader)?;
    let signed_headers = signed_headers.ok_or(AuthError::InvalidAuthHeader)?;
    let signature = signature.ok_or(AuthError::InvalidAuthHeader)?;

    let scope: Vec<&str> = credential.splitn(5, '/').collect();
    if scope.len() != 5 || scope[4] != "aws4_request" {
        return Err(AuthError::InvalidCredential);
    }

    Ok(ParsedAuth {
        access_key_id: scope[0].to_owned(),
        date: scope[1].to_owned(),
        region: scope[2].to_owned(),
        service: scope[3].to_owned(),
        signed_headers: signed_headers.split(';').map(ToOwned::to_owned).collect(),
        signature: signature.to_owned(),
    })
}

/// Derive the SigV4 signing key.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let region_key = hmac_sha256(&date_key, region.as_bytes());
    let service_key = hmac_sha256(&region_key, service.as_bytes());
    hmac_sha256(&service_key, b"aws4_request")
}

/// Sign `req` in place, adding `x-amz-date` and `Authorization`.
///
/// The request must carry a `host` header. When it carries a digest header,
/// that header is signed and its value becomes the payload hash.
///
/// # Errors
///
/// Returns [`AuthError::MissingHeader`] if `host` is absent, or
/// [`AuthError::InvalidDigest`] if the digest header is malformed.
pub fn sign_request<B>(
    req: &mut http::Request<B>,
    params: &SigningParams,
) -> Result<(), AuthError> {
    if !req.headers().contains_key(http::header::HOST) {
        return Err(AuthError::MissingHeader("host".to_owned()));
    }
    let payload_hash = payload_hash(req.headers())?;

    let timestamp = params.timestamp.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.timestamp.format("%Y%m%d").to_string();
    req.headers_mut().insert(
        AMZ_DATE_HEADER,
        http::HeaderValue::from_str(&timestamp).map_err(|_| AuthError::InvalidAuthHeader)?,
    );

    let mut signed_headers = vec!["host".to_owned(), AMZ_DATE_HEADER.to_owned()];
    if req.headers().contains_key(CONTENT_SHA256_HEADER) {
        signed_headers.push(CONTENT_SHA256_HEADER.to_owned());
    }

    let headers = collect_headers(req.headers(), &signed_headers)?;
    let canonical = CanonicalRequest {
        method: req.method().as_str(),
        path: req.uri().path(),
        query: req.uri().query().unwrap_or(""),
        headers,
        signed_headers: signed_headers.clone(),
        payload_hash: &payload_hash,
    };

    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);
    let string_to_sign = build_string_to_sign(&timestamp, &scope, &canonical.hash());
    let key = derive_signing_key(&params.secret_key, &date, &params.region, &params.service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{SUPPORTED_ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
        params.access_key_id,
        signed_headers_string(&signed_headers),
    );
    req.headers_mut().insert(
        http::header::AUTHORIZATION,
        http::HeaderValue::from_str(&authorization).map_err(|_| AuthError::InvalidAuthHeader)?,
    );

    debug!(
        access_key_id = %params.access_key_id,
        signed_headers = %signed_headers_string(&signed_headers),
        "signed origin request"
    );
    Ok(())
}

/// Verify a SigV4-signed request whose payload hash is the digest header.
///
/// # Errors
///
/// Returns an [`AuthError`] if the `Authorization` header is missing or
/// malformed, the access key is unknown, a signed header is missing, a request
/// carrying a digest does not sign it, or the signature does not match.
pub fn verify_sigv4(
    parts: &http::request::Parts,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    let parsed = parse_authorization_header(auth_header)?;

    if parts.headers.contains_key(CONTENT_SHA256_HEADER)
        && !parsed.signed_headers.iter().any(|h| h == CONTENT_SHA256_HEADER)
    {
        return Err(AuthError::DigestNotSigned(CONTENT_SHA256_HEADER.to_owned()));
    }

    let secret_key = credential_provider.get_secret_key(&parsed.access_key_id)?;
    let timestamp = parts
        .headers
        .get(AMZ_DATE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::MissingHeader(AMZ_DATE_HEADER.to_owned()))?;
    if !timestamp.starts_with(&parsed.date) {
        return Err(AuthError::InvalidCredential);
    }

    debug!(
        access_key_id = %parsed.access_key_id,
        region = %parsed.region,
        service = %parsed.service,
        "verifying SigV4 signature"
    );

    let payload_hash = payload_hash(&parts.headers)?;
    let canonical = CanonicalRequest {
        method: parts.method.as_str(),
        path: parts.uri.path(),
        query: parts.uri.query().unwrap_or(""),
        headers: collect_headers(&parts.headers, &parsed.signed_headers)?,
        signed_headers: parsed.signed_headers.clone(),
        payload_hash: &payload_hash,
    };

    let scope = format!(
        "{}/{}/{}/aws4_request",
        parsed.date, parsed.region, parsed.service
    );
    let string_to_sign = build_string_to_sign(timestamp, &scope, &canonical.hash());
    let key = derive_signing_key(&secret_key, &parsed.date, &parsed.region, &parsed.service);
    let expected = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    if bool::from(parsed.signature.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(AuthResult {
            access_key_id: parsed.access_key_id,
            region: parsed.region,
            service: parsed.service,
            signed_headers: parsed.signed_headers,
            payload_hash,
        })
    } else {
        debug!(access_key_id = %parsed.access_key_id, "signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Build the SigV4 string to sign.
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{SUPPORTED_ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// The payload hash a signature binds: the digest header, or the empty digest.
fn payload_hash(headers: &http::HeaderMap) -> Result<String, AuthError> {
    match headers.get(CONTENT_SHA256_HEADER) {
        None => Ok(ContentDigest::EMPTY.to_owned()),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AuthError::InvalidDigest("<non-ascii>".to_owned()))?;
            value.parse::<ContentDigest>().map(String::from)
        }
    }
}

fn collect_headers<'a>(
    headers: &'a http::HeaderMap,
    signed_headers: &'a [String],
) -> Result<Vec<(&'a str, &'a str)>, AuthError> {
    let mut pairs = Vec::with_capacity(signed_headers.len());
    for name in signed_headers {
        let mut values = headers.get_all(name.as_str()).iter().peekable();
        if values.peek().is_none() {
            return Err(AuthError::MissingHeader(name.clone()));
        }
        for value in values {
            let value = value
                .to_str()
                .map_err(|_| AuthError::MissingHeader(name.clone()))?;
            pairs.push((name.as_str(), value));
        }
    }
    Ok(pairs)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

//! Canonical request construction for AWS Signature Version 4.
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! For origin requests the hashed payload is the value of the
//! `x-content-sha256` header, so the signature binds the body digest.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};

/// Characters left unencoded in a URI path segment (RFC 3986 unreserved set).
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The pieces of an HTTP request that a SigV4 signature covers.
#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Request path, possibly percent-encoded.
    pub path: &'a str,
    /// Raw query string without the leading `?`.
    pub query: &'a str,
    /// All candidate headers; only the signed ones are rendered.
    pub headers: Vec<(&'a str, &'a str)>,
    /// Lowercase names of the signed headers.
    pub signed_headers: Vec<String>,
    /// Hex SHA-256 of the payload.
    pub payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    /// Render the canonical request string.
    ///
    /// # Examples
    ///
    /// ```
    /// use edgestack_auth::canonical::CanonicalRequest;
    ///
    /// let canonical = CanonicalRequest {
    ///     method: "POST",
    ///     path: "/sse",
    ///     query: "",
    ///     headers: vec![("Host", "example.com")],
    ///     signed_headers: vec!["host".to_owned()],
    ///     payload_hash: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
    /// };
    /// assert!(canonical.render().starts_with("POST\n/sse\n\nhost:example.com\n"));
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n\n{}\n{}",
            self.method,
            canonical_uri(self.path),
            canonical_query_string(self.query),
            self.canonical_headers(),
            signed_headers_string(&self.signed_headers),
            self.payload_hash,
        )
    }

    /// Hex SHA-256 of the rendered canonical request.
    #[must_use]
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.render().as_bytes()))
    }

    /// Signed headers as `name:value` lines, sorted by name.
    ///
    /// Repeated headers are joined with commas; values are trimmed and inner
    /// whitespace runs collapse to one space.
    fn canonical_headers(&self) -> String {
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in &self.headers {
            let value = collapse_whitespace(value.trim());
            values
                .entry(name.to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let mut signed: Vec<&str> = self.signed_headers.iter().map(String::as_str).collect();
        signed.sort_unstable();
        signed
            .iter()
            .filter_map(|name| values.get(*name).map(|value| format!("{name}:{value}")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Encode each path segment, preserving `/`. Empty paths become `/`.
#[must_use]
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }
    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, URI_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Sort query parameters by name, then value, keeping raw encodings.
#[must_use]
pub fn canonical_query_string(query: &str) -> String {
    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();
    params.sort_unstable();
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sorted, semicolon-separated header names.
#[must_use]
pub fn signed_headers_string(signed_headers: &[String]) -> String {
    let mut sorted: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(";")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_should_match_aws_get_object_canonical_hash() {
        let canonical = CanonicalRequest {
            method: "GET",
            path: "/test.txt",
            query: "",
            headers: vec![
                ("Host", "examplebucket.s3.amazonaws.com"),
                ("Range", "bytes=0-9"),
                ("x-amz-content-sha256", EMPTY_HASH),
                ("x-amz-date", "20130524T000000Z"),
            ],
            signed_headers: ["host", "range", "x-amz-content-sha256", "x-amz-date"]
                .map(ToOwned::to_owned)
                .to_vec(),
            payload_hash: EMPTY_HASH,
        };
        assert_eq!(
            canonical.hash(),
            "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972"
        );
    }

    #[test]
    fn test_should_normalize_uri() {
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(canonical_uri("/"), "/");
        assert_eq!(canonical_uri("/hello world"), "/hello%20world");
        assert_eq!(canonical_uri("/already%20encoded"), "/already%20encoded");
    }

    #[test]
    fn test_should_sort_query_parameters() {
        assert_eq!(canonical_query_string("b=2&a=1&c"), "a=1&b=2&c=");
        assert_eq!(canonical_query_string(""), "");
    }

    #[test]
    fn test_should_join_repeated_headers_and_skip_unsigned() {
        let canonical = CanonicalRequest {
            method: "POST",
            path: "/",
            query: "",
            headers: vec![
                ("X-Tag", " a "),
                ("x-tag", "b   c"),
                ("user-agent", "curl"),
            ],
            signed_headers: vec!["x-tag".to_owned()],
            payload_hash: EMPTY_HASH,
        };
        assert_eq!(canonical.canonical_headers(), "x-tag:a,b c");
    }

    #[test]
    fn test_should_sort_signed_header_names() {
        let names = ["x-content-sha256", "host"].map(ToOwned::to_owned);
        assert_eq!(signed_headers_string(&names), "host;x-content-sha256");
    }
}

//! SHA-256 content digests.
//!
//! [`compute_digest`] is the single digest computer used on both sides of the
//! edge/origin boundary: the edge calls it to produce the `x-content-sha256`
//! header, the origin calls it again to check that header.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Header carrying the content digest, in its canonical lowercase form.
pub const CONTENT_SHA256_HEADER: &str = "x-content-sha256";

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 digest of a byte payload.
///
/// Always exactly 64 characters from `[0-9a-f]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Digest of the empty payload.
    pub const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    /// Get the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the digest of an empty payload.
    #[must_use]
    pub fn is_empty_payload(&self) -> bool {
        self.0 == Self::EMPTY
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentDigest {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == DIGEST_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(Self(s.to_owned()))
        } else {
            Err(AuthError::InvalidDigest(s.to_owned()))
        }
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}

/// Compute the SHA-256 digest of `payload`.
///
/// Pure and deterministic. The empty payload is a valid input.
///
/// # Examples
///
/// ```
/// use edgestack_auth::compute_digest;
///
/// assert_eq!(
///     compute_digest(b"").as_str(),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn compute_digest(payload: &[u8]) -> ContentDigest {
    ContentDigest(hex::encode(Sha256::digest(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_hash_empty_payload() {
        let digest = compute_digest(b"");
        assert_eq!(digest.as_str(), ContentDigest::EMPTY);
        assert!(digest.is_empty_payload());
    }

    #[test]
    fn test_should_match_known_json_vector() {
        assert_eq!(
            compute_digest(br#"{"count":10}"#).as_str(),
            "4c9caa2c9fbb5e5f0099ac08ff7a74fd9c6711d307d1e88705cb791b157d3404"
        );
    }

    #[test]
    fn test_should_be_deterministic_lowercase_hex() {
        let first = compute_digest(b"abc");
        let second = compute_digest(b"abc");
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), DIGEST_HEX_LEN);
        assert_eq!(first.as_str(), first.as_str().to_ascii_lowercase());
        assert_eq!(
            first.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_should_change_digest_when_one_byte_changes() {
        let corpus: Vec<Vec<u8>> = (0u8..=255).map(|b| vec![b'{', b, b'}']).collect();
        let digests: std::collections::HashSet<String> = corpus
            .iter()
            .map(|bytes| compute_digest(bytes).into())
            .collect();
        assert_eq!(digests.len(), corpus.len());

        assert_ne!(
            compute_digest(br#"{"count":10}"#),
            compute_digest(br#"{"count":11}"#)
        );
    }

    #[test]
    fn test_should_hash_non_utf8_bytes_verbatim() {
        assert_eq!(
            compute_digest(&[0xff, 0xfe, 0x00, 0x01]).as_str(),
            "d2ad9277baaee14856d20ec2b21f87a0cb8a7f86c6ef090fd5a082b1e85135ac"
        );
    }

    #[test]
    fn test_should_parse_only_well_formed_digests() {
        assert!(ContentDigest::EMPTY.parse::<ContentDigest>().is_ok());
        assert!("abc".parse::<ContentDigest>().is_err());
        assert!(
            ContentDigest::EMPTY
                .to_ascii_uppercase()
                .parse::<ContentDigest>()
                .is_err()
        );
        assert!("g".repeat(64).parse::<ContentDigest>().is_err());
    }

    #[test]
    fn test_should_serialize_as_plain_string() {
        let digest = compute_digest(b"abc");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{digest}\""));
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}

//! Request signing for provider APIs
//!
//! Three interchangeable schemes sit behind [`RequestSigner`]:
//!
//! - [`SigV4Signer`]: AWS Signature Version 4 (chained HMAC-SHA256)
//! - [`LegacyHmacSigner::s3`]: S3 header signing (HMAC-SHA1, `AWS` prefix)
//! - [`LegacyHmacSigner::gcs`]: GCS interoperable signing (HMAC-SHA1, `GOOG1` prefix)
//!
//! All of them are pure functions of a [`SigningContext`]. Output must match
//! the providers byte for byte.

pub mod legacy;
pub mod sigv4;

pub use legacy::{canonical_resource, LegacyHmacSigner};
pub use sigv4::SigV4Signer;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Signing errors
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// Access key or secret is empty
    #[error("missing signing credentials")]
    MissingCredentials,

    /// The HMAC primitive rejected the key
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// Unknown signing scheme requested
    #[error("unknown signing scheme: {0}")]
    UnknownScheme(String),
}

/// A credential that never prints its value
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value (only for signing)
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Everything a signature is computed from
///
/// `canonical_uri` is the unencoded request path for SigV4 and the
/// canonicalized resource (see [`canonical_resource`]) for the legacy schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub access_key: String,
    pub secret: Secret,
    pub region: String,
    pub method: String,
    pub canonical_uri: String,
    pub query: BTreeMap<String, String>,
    /// Headers keyed by lowercase name
    pub headers: BTreeMap<String, String>,
    /// Lowercase hex SHA-256 of the payload
    pub payload_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl SigningContext {
    /// Start a context for an empty-bodied request signed now
    pub fn new(
        access_key: impl Into<String>,
        secret: impl Into<Secret>,
        region: impl Into<String>,
        method: impl AsRef<str>,
        canonical_uri: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret: secret.into(),
            region: region.into(),
            method: method.as_ref().to_uppercase(),
            canonical_uri: canonical_uri.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            payload_hash: sha256_hex(b""),
            timestamp: Utc::now(),
        }
    }

    /// Add a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Add a header (name is lowercased)
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    /// Hash `payload` as the request body
    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload_hash = sha256_hex(payload);
        self
    }

    /// Fix the signing time
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn check_credentials(&self) -> Result<(), SigningError> {
        if self.access_key.is_empty() || self.secret.is_empty() {
            return Err(SigningError::MissingCredentials);
        }
        Ok(())
    }
}

/// Computes the `Authorization` header value for a request
pub trait RequestSigner: Send + Sync {
    /// Scheme implemented by this signer
    fn scheme(&self) -> SigningScheme;

    /// The exact string the signature is computed over
    fn string_to_sign(&self, ctx: &SigningContext) -> String;

    /// Full `Authorization` header value
    fn authorization(&self, ctx: &SigningContext) -> Result<String, SigningError>;

    /// Name and value of the date header the scheme expects for `timestamp`
    fn date_header(&self, timestamp: DateTime<Utc>) -> (&'static str, String);
}

/// Supported signing schemes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningScheme {
    /// AWS SigV4 for the named service (e.g. `elastictranscoder`)
    AwsV4 { service: String },
    /// S3 legacy header signing
    S3Legacy,
    /// GCS interoperable header signing
    GcsLegacy,
}

impl SigningScheme {
    /// Resolve a scheme from a destination service name
    ///
    /// `s3` and `gcs` select the legacy schemes; `aws:<service>` selects SigV4.
    pub fn for_service(name: &str) -> Result<Self, SigningError> {
        match name.to_lowercase().as_str() {
            "s3" => Ok(Self::S3Legacy),
            "gcs" | "google" => Ok(Self::GcsLegacy),
            other => match other.strip_prefix("aws:") {
                Some(service) if !service.is_empty() => Ok(Self::AwsV4 {
                    service: service.to_string(),
                }),
                _ => Err(SigningError::UnknownScheme(name.to_string())),
            },
        }
    }

    /// Build the signer for this scheme
    pub fn signer(&self) -> Box<dyn RequestSigner> {
        match self {
            Self::AwsV4 { service } => Box::new(SigV4Signer::new(service.clone())),
            Self::S3Legacy => Box::new(LegacyHmacSigner::s3()),
            Self::GcsLegacy => Box::new(LegacyHmacSigner::gcs()),
        }
    }
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn is_unreserved(c: u8) -> bool {
    matches!(c, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~')
}

/// Percent-encode everything outside the RFC 3986 unreserved set
pub fn pct_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Percent-encode each path segment, keeping the `/` separators
pub fn pct_encode_path(path: &str) -> String {
    path.split('/').map(pct_encode).collect::<Vec<_>>().join("/")
}

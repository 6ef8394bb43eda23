//! # Update Manifest
//!
//! A manifest describes one published release on one branch: when it was
//! published, how quickly the rollout should reach every device, and who
//! signed it. The download stage writes it to disk as a JSON document:
//!
//! ```json
//! {
//!   "manifest": {
//!     "branch": "stable",
//!     "date": "2026-01-15T12:00:00Z",
//!     "priority": 1.0,
//!     "payload": { "images": [] }
//!   },
//!   "signatures": [ { "key": "<64 hex chars>", "signature": "<128 hex chars>" } ]
//! }
//! ```
//!
//! The signed message is the canonical form of the `manifest` object exactly
//! as received, so fields this version does not model are still covered by
//! the signatures.
//!
//! A manifest is created fresh for every mirror attempt and is either
//! discarded (trust failure, rollout deferral) or consumed once by the
//! apply stage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::CanonicalBytes;
use crate::digest::{sha256_digest, ContentDigest};
use crate::error::{ManifestError, ValidationError};
use crate::temporal::Timestamp;

/// Rollout priority: the number of days over which the update probability
/// rises from zero to certainty.
///
/// Always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Priority(f64);

impl Priority {
    /// Priority zero: the rollout window is already closed at publication.
    pub const IMMEDIATE: Priority = Priority(0.0);

    /// Validate a priority expressed in days.
    pub fn new(days: f64) -> Result<Self, ValidationError> {
        if days.is_finite() && days >= 0.0 {
            Ok(Self(days))
        } else {
            Err(ValidationError::InvalidPriority(days))
        }
    }

    /// The priority in days.
    pub fn days(&self) -> f64 {
        self.0
    }

    /// The rollout window in seconds (`days * 86400`).
    pub fn window_secs(&self) -> f64 {
        self.0 * 86_400.0
    }
}

impl TryFrom<f64> for Priority {
    type Error = ValidationError;

    fn try_from(days: f64) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<Priority> for f64 {
    fn from(p: Priority) -> f64 {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.0)
    }
}

/// The signed portion of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestBody {
    /// Release branch this manifest was published for.
    pub branch: String,
    /// Publication time.
    pub date: Timestamp,
    /// Rollout priority in days.
    pub priority: Priority,
    /// Opaque data for the apply stage (image lists, checksums, versions).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl ManifestBody {
    /// Canonical bytes of this body, i.e. the message a release signer signs.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, ManifestError> {
        Ok(CanonicalBytes::new(self)?)
    }
}

/// One signature attached to a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSignature {
    /// Identifier of the signing key: its hex-encoded public key.
    #[serde(rename = "key")]
    pub key_id: String,
    /// Raw signature bytes, hex-encoded on the wire.
    #[serde(with = "crate::hex::serde_bytes")]
    pub signature: Vec<u8>,
}

impl ManifestSignature {
    /// Create a signature entry, normalizing the key id to lowercase hex.
    pub fn new(key_id: impl AsRef<str>, signature: Vec<u8>) -> Self {
        Self {
            key_id: normalize_key_id(key_id.as_ref()),
            signature,
        }
    }
}

/// Normalize a key identifier for set membership checks.
pub fn normalize_key_id(key_id: &str) -> String {
    key_id.trim().to_ascii_lowercase()
}

#[derive(Deserialize)]
struct RawDocument {
    manifest: Value,
    #[serde(default)]
    signatures: Vec<ManifestSignature>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    manifest: &'a Value,
    signatures: &'a [ManifestSignature],
}

/// A parsed manifest together with the canonical bytes its signatures cover.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    body: ManifestBody,
    raw_body: Value,
    signatures: Vec<ManifestSignature>,
    signed: CanonicalBytes,
}

impl Manifest {
    /// Build a manifest from a body and its signatures.
    pub fn new(body: ManifestBody, signatures: Vec<ManifestSignature>) -> Result<Self, ManifestError> {
        let raw_body = serde_json::to_value(&body)?;
        Self::assemble(body, raw_body, signatures)
    }

    /// Parse a manifest document.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the document is not JSON, lacks the
    /// `manifest` object, carries an unparseable date, a negative or
    /// non-finite priority, or non-hex signatures.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestError> {
        let raw: RawDocument = serde_json::from_slice(bytes)?;
        let body: ManifestBody = serde_json::from_value(raw.manifest.clone())?;
        Self::assemble(body, raw.manifest, raw.signatures)
    }

    /// Render the manifest as a document accepted by [`Manifest::from_json`].
    pub fn to_json(&self) -> Result<String, ManifestError> {
        let doc = DocumentRef {
            manifest: &self.raw_body,
            signatures: &self.signatures,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    fn assemble(
        body: ManifestBody,
        raw_body: Value,
        signatures: Vec<ManifestSignature>,
    ) -> Result<Self, ManifestError> {
        let signed = CanonicalBytes::new(&raw_body)?;
        let signatures = signatures
            .into_iter()
            .map(|s| ManifestSignature::new(&s.key_id, s.signature))
            .collect();
        Ok(Self {
            body,
            raw_body,
            signatures,
            signed,
        })
    }

    /// The signed body.
    pub fn body(&self) -> &ManifestBody {
        &self.body
    }

    /// Branch the manifest was published for.
    pub fn branch(&self) -> &str {
        &self.body.branch
    }

    /// Publication time.
    pub fn publish_date(&self) -> Timestamp {
        self.body.date
    }

    /// Rollout priority.
    pub fn priority(&self) -> Priority {
        self.body.priority
    }

    /// Opaque payload for the apply stage.
    pub fn payload(&self) -> &Value {
        &self.body.payload
    }

    /// Attached signatures, key ids normalized to lowercase.
    pub fn signatures(&self) -> &[ManifestSignature] {
        &self.signatures
    }

    /// The bytes every signature must cover.
    pub fn signed_bytes(&self) -> &CanonicalBytes {
        &self.signed
    }

    /// SHA-256 over the signed bytes.
    pub fn digest(&self) -> ContentDigest {
        sha256_digest(&self.signed)
    }
}

//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error types shared across the autoupdater workspace. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Settings errors are fatal: the process reports them and exits before
//!   any mirror is contacted.
//! - Manifest errors are per-mirror: the engine treats them as a failed
//!   fetch and moves on to the next mirror.
//! - Crypto errors never escape the trust evaluator; an unverifiable
//!   signature simply does not count toward the threshold.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Timestamp string is not valid RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Priority must be a finite, non-negative number of days.
    #[error("invalid priority: {0} (expected a finite number of days >= 0)")]
    InvalidPriority(f64),

    /// A hex-encoded field could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key parsing failed.
    #[error("key error: {0}")]
    KeyError(String),
}

/// Errors raised while parsing or constructing a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest document is not valid JSON or does not match the
    /// expected shape.
    #[error("malformed manifest document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field failed domain validation.
    #[error("invalid manifest field: {0}")]
    Validation(#[from] ValidationError),

    /// The manifest body could not be canonicalized for signature checks.
    #[error("manifest canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Errors raised when assembling [`Settings`](crate::Settings).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// No branch was configured and none was given on the command line.
    #[error("no branch given in settings or command line")]
    MissingBranch,

    /// The signature threshold must be at least one.
    #[error("invalid value for option 'good_signatures': must be a positive integer")]
    ZeroThreshold,

    /// An update attempt needs at least one mirror.
    #[error("invalid value for option 'mirrors': at least one mirror is required")]
    NoMirrors,

    /// Trust evaluation needs at least one public key.
    #[error("invalid value for option 'pubkeys': at least one public key is required")]
    NoPublicKeys,
}

//! # autoupdater-core: Foundational Types for the Autoupdater
//!
//! This crate is the leaf of the workspace. It defines the values that flow
//! between the settings provider, the update engine, and the hook
//! collaborators. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Immutable [`Settings`].** Built and validated once by the settings
//!    provider, then passed by reference into the orchestrator. There is no
//!    process-wide mutable configuration.
//!
//! 2. **[`CanonicalBytes`] is the signed message.** A manifest signature is
//!    always checked against the RFC 8785 canonical form of the manifest
//!    body, never against whatever bytes happened to arrive from a mirror.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] is UTC with seconds precision,
//!    so the rollout gate works on whole-second differences.
//!
//! 4. **Validated newtypes.** [`Priority`] cannot be negative or non-finite;
//!    a manifest carrying one is rejected at parse time.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `autoupdater-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod hex;
pub mod manifest;
pub mod settings;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, CryptoError, ManifestError, SettingsError, ValidationError};
pub use manifest::{Manifest, ManifestBody, ManifestSignature, Priority};
pub use settings::{Settings, SettingsBuilder};
pub use temporal::Timestamp;

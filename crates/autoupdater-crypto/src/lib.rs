//! # autoupdater-crypto: Manifest Trust
//!
//! - **Ed25519** public keys, signatures and key pairs. Release signers use
//!   [`Ed25519KeyPair`]; devices only ever hold [`Ed25519PublicKey`] trust
//!   anchors.
//! - **[`SignatureVerifier`]**, the seam through which the trust evaluator
//!   checks a single signature. [`Ed25519Verifier`] is the production
//!   implementation.
//! - **Trust threshold evaluation**: a manifest is trusted when at least
//!   `signature_threshold` distinct configured keys have validly signed it.

pub mod ed25519;
pub mod trust;

// Re-export primary types.
pub use ed25519::{verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use trust::{evaluate, is_trusted, Ed25519Verifier, SignatureVerifier, TrustVerdict};

//! # Trust Threshold Evaluation
//!
//! A manifest is trusted when at least `signature_threshold` *distinct*
//! configured public keys have produced a valid signature over its canonical
//! body. Signatures from unknown keys are ignored. A key that signed twice
//! counts once. An invalid signature from a known key does not count.
//!
//! Whether a single signature is valid is decided by a [`SignatureVerifier`]
//! collaborator, so the counting rules can be tested independently of the
//! curve arithmetic.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use autoupdater_core::{CanonicalBytes, Manifest};

use crate::ed25519::{verify_with_public_key, Ed25519PublicKey, Ed25519Signature};

/// Checks one signature made by `key_id` over `message`.
pub trait SignatureVerifier {
    /// Returns `true` iff the signature is valid.
    fn verify(&self, key_id: &str, message: &CanonicalBytes, signature: &[u8]) -> bool;
}

/// Production verifier: key ids are hex-encoded Ed25519 public keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, key_id: &str, message: &CanonicalBytes, signature: &[u8]) -> bool {
        let checked = Ed25519PublicKey::from_hex(key_id).and_then(|pk| {
            let sig = Ed25519Signature::from_slice(signature)?;
            verify_with_public_key(message, &sig, &pk)
        });
        match checked {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(key = key_id, error = %e, "signature rejected");
                false
            }
        }
    }
}

/// Outcome of evaluating a manifest against the trust anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustVerdict {
    /// Configured keys with at least one valid signature.
    pub valid_keys: BTreeSet<String>,
    /// Number of distinct valid signatures required.
    pub required: usize,
}

impl TrustVerdict {
    /// Number of distinct keys that validly signed.
    pub fn valid_count(&self) -> usize {
        self.valid_keys.len()
    }

    /// Whether the threshold is met.
    pub fn is_trusted(&self) -> bool {
        self.valid_count() >= self.required
    }
}

/// Count distinct valid signatures from `public_keys` on `manifest`.
///
/// `public_keys` must hold normalized (lowercase) key ids, as produced by
/// [`Settings`](autoupdater_core::Settings).
pub fn evaluate(
    manifest: &Manifest,
    public_keys: &BTreeSet<String>,
    threshold: NonZeroUsize,
    verifier: &dyn SignatureVerifier,
) -> TrustVerdict {
    let mut valid_keys = BTreeSet::new();
    for sig in manifest.signatures() {
        if !public_keys.contains(&sig.key_id) || valid_keys.contains(&sig.key_id) {
            continue;
        }
        if verifier.verify(&sig.key_id, manifest.signed_bytes(), &sig.signature) {
            valid_keys.insert(sig.key_id.clone());
        }
    }
    TrustVerdict {
        valid_keys,
        required: threshold.get(),
    }
}

/// Whether `manifest` carries at least `threshold` distinct valid signatures
/// from `public_keys`.
pub fn is_trusted(
    manifest: &Manifest,
    public_keys: &BTreeSet<String>,
    threshold: NonZeroUsize,
    verifier: &dyn SignatureVerifier,
) -> bool {
    evaluate(manifest, public_keys, threshold, verifier).is_trusted()
}

//! # Collaborator Traits
//!
//! The engine calls out to three external stages and to the device clock.
//! None of them carry a timeout imposed by the engine; a slow stage simply
//! blocks the run.

use std::time::Duration;

use autoupdater_core::{Manifest, Timestamp};

use crate::error::{ClockError, HookError};

/// The download, abort and upgrade stages.
pub trait UpdateHooks {
    /// Fetch and parse the manifest published on `mirror`.
    ///
    /// Any failure (network, missing file, malformed document) is reported
    /// as an error; the engine does not distinguish between them.
    fn download(&mut self, mirror: &str) -> Result<Manifest, HookError>;

    /// Clean up after a manifest that failed trust evaluation. The result
    /// is logged and otherwise ignored.
    fn abort(&mut self, manifest: &Manifest) -> Result<(), HookError>;

    /// Apply a trusted, rollout-approved manifest fetched from `mirror`.
    fn apply(&mut self, mirror: &str, manifest: Manifest) -> Result<(), HookError>;
}

/// Wall clock and uptime of the device.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;

    /// Time since boot.
    fn uptime(&self) -> Result<Duration, ClockError>;
}

impl<H: UpdateHooks + ?Sized> UpdateHooks for &mut H {
    fn download(&mut self, mirror: &str) -> Result<Manifest, HookError> {
        (**self).download(mirror)
    }

    fn abort(&mut self, manifest: &Manifest) -> Result<(), HookError> {
        (**self).abort(manifest)
    }

    fn apply(&mut self, mirror: &str, manifest: Manifest) -> Result<(), HookError> {
        (**self).apply(mirror, manifest)
    }
}

//! # Engine Errors
//!
//! Only [`RunError`] ever escapes [`Orchestrator::run`](crate::Orchestrator::run).
//! Hook failures are per-mirror and are absorbed by the failover loop.

use autoupdater_core::ManifestError;
use thiserror::Error;

/// The external stage a hook failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Manifest fetch.
    Download,
    /// Cleanup after an untrusted manifest.
    Abort,
    /// Applying the update.
    Upgrade,
}

impl Stage {
    /// Stage name, matching the hook directory prefix (`download.d`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Abort => "abort",
            Self::Upgrade => "upgrade",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook collaborator reported failure.
#[derive(Error, Debug)]
pub enum HookError {
    /// The stage ran and reported failure.
    #[error("{stage} stage failed: {reason}")]
    Failed {
        /// Failing stage.
        stage: Stage,
        /// Human-readable cause.
        reason: String,
    },

    /// The stage could not be run at all.
    #[error("{stage} stage could not run: {source}")]
    Io {
        /// Failing stage.
        stage: Stage,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The download stage produced an unusable manifest.
    #[error("manifest rejected: {0}")]
    Manifest(#[from] ManifestError),
}

/// Mirror pool construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The mirror list was empty. This is a configuration error, distinct
    /// from running out of mirrors during a run.
    #[error("no mirrors configured")]
    Empty,
}

/// Device clock errors.
#[derive(Error, Debug)]
pub enum ClockError {
    /// System uptime could not be determined.
    #[error("unable to determine uptime: {0}")]
    UptimeUnavailable(String),
}

/// Fatal errors that abort a run.
#[derive(Error, Debug)]
pub enum RunError {
    /// Mirror pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The rollout gate needed the uptime and could not get it.
    #[error(transparent)]
    Clock(#[from] ClockError),
}

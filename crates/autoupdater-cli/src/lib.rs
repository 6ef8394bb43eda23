//! # autoupdater-cli: The `autoupdater` Binary
//!
//! Wraps the decision and failover engine in the process a device runs
//! from its scheduler:
//!
//! 1. load settings from the YAML file and command line ([`config`]),
//! 2. exit cleanly if updates are disabled and not forced,
//! 3. seed the run's random number generator ([`clock`]),
//! 4. take the single-instance lock ([`lock`]),
//! 5. run the orchestrator with script-directory hooks ([`hooks`]),
//! 6. map the outcome to an exit status.
//!
//! ```bash
//! autoupdater                       # scheduled run
//! autoupdater --force --branch beta # manual run on another branch
//! autoupdater --fallback -vv        # delayed-certainty policy, debug logs
//! ```

pub mod clock;
pub mod config;
pub mod hooks;
pub mod lock;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;

use autoupdater_crypto::Ed25519Verifier;
use autoupdater_engine::{Clock, Orchestrator, RunOutcome};

use crate::clock::SystemClock;
use crate::config::{Overrides, RuntimeConfig};
use crate::hooks::ScriptHooks;
use crate::lock::{InstanceLock, LockError};

/// Exit status for an updated, disabled or deferred run.
pub const EXIT_SUCCESS: u8 = 0;

/// Exit status for fatal errors, lock contention and mirror exhaustion.
pub const EXIT_FAILURE: u8 = 1;

/// Staged, fault-tolerant firmware autoupdater.
///
/// Decides whether this device updates now, picks a mirror, verifies the
/// release signatures and hands over to the upgrade scripts.
#[derive(Parser, Debug)]
#[command(name = "autoupdater", version, about, long_about = None)]
pub struct Cli {
    /// Use this branch instead of the configured one.
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Update even when the autoupdater is disabled.
    #[arg(short, long)]
    pub force: bool,

    /// Only update once the rollout window plus one day has passed.
    #[arg(long)]
    pub fallback: bool,

    /// Path to the configuration file.
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            branch: self.branch.clone(),
            force: self.force,
            fallback: self.fallback,
        }
    }
}

/// Execute one autoupdater run.
///
/// Returns the process exit status. Fatal configuration and environment
/// errors are returned as `Err` and map to [`EXIT_FAILURE`]. A disabled
/// device exits before the lock is touched.
pub fn run(cli: &Cli) -> Result<u8> {
    let runtime = config::load(&cli.config, &cli.overrides())
        .with_context(|| format!("unable to load settings from {}", cli.config.display()))?;
    if !runtime.settings.updates_permitted() {
        tracing::info!("autoupdater is disabled");
        return Ok(EXIT_SUCCESS);
    }
    let rng = clock::seed_rng().context("unable to seed random number generator")?;

    let _lock = match InstanceLock::acquire(&runtime.lock_file) {
        Ok(lock) => lock,
        Err(LockError::AlreadyRunning) => {
            tracing::warn!("another instance is currently running");
            return Ok(EXIT_FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    run_locked(&runtime, SystemClock::default(), rng)
}

/// Run the orchestrator with script hooks. The caller holds the lock.
pub fn run_locked<C: Clock, R: Rng>(runtime: &RuntimeConfig, clock: C, rng: R) -> Result<u8> {
    let mut hooks = ScriptHooks::new(&runtime.hook_dir, &runtime.work_dir, &runtime.settings);
    let report = Orchestrator::new(&runtime.settings, &mut hooks, clock, Ed25519Verifier, rng).run()?;
    tracing::debug!(
        run_id = %report.run_id,
        attempts = report.attempts.len(),
        outcome = ?report.outcome,
        "run finished"
    );
    Ok(exit_code(&report.outcome))
}

/// Process exit status for a run outcome.
pub fn exit_code(outcome: &RunOutcome) -> u8 {
    if outcome.is_failure() {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&RunOutcome::Disabled), EXIT_SUCCESS);
        assert_eq!(exit_code(&RunOutcome::Deferred { mirror: "m".into() }), EXIT_SUCCESS);
        assert_eq!(exit_code(&RunOutcome::Updated { mirror: "m".into() }), EXIT_SUCCESS);
        assert_eq!(exit_code(&RunOutcome::Exhausted), EXIT_FAILURE);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["autoupdater", "-b", "beta", "-f", "--fallback", "-vv"]).unwrap();
        assert_eq!(cli.branch.as_deref(), Some("beta"));
        assert!(cli.force);
        assert!(cli.fallback);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from(config::DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["autoupdater"]).unwrap();
        assert!(cli.branch.is_none());
        assert!(!cli.force);
        assert!(!cli.fallback);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["autoupdater", "--now"]).is_err());
    }
}

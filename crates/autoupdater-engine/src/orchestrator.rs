//! # Update Orchestrator
//!
//! Drives one autoupdater run end to end.
//!
//! ```text
//! Idle ─▶ CheckEnabled ──disabled──▶ Done(Disabled)
//!              │
//!              ▼
//!        MirrorAttempt ◀──────────────────────────────┐
//!   fetch ─fail─▶ mark failed ────────────────────────┤
//!   trust ─fail─▶ abort stage, mark failed ───────────┤
//!              │                                      │
//!              ▼                                      │
//!        GateDecision ──no──▶ Done(Deferred)          │
//!              │                                      │
//!   apply ─fail─▶ mark failed ────────────────────────┘
//!              │
//!              ▼
//!        Done(Updated)        pool empty ─▶ Done(Exhausted)
//! ```
//!
//! The gate runs after a manifest has been fetched and trusted, because it
//! needs the manifest's publish date and priority. A "not yet" from the
//! gate ends the run without touching other mirrors: the decision does not
//! depend on which mirror served the manifest.

use autoupdater_core::{Manifest, Settings};
use autoupdater_crypto::{trust, SignatureVerifier};
use rand::Rng;
use uuid::Uuid;

use crate::error::RunError;
use crate::gate;
use crate::hooks::{Clock, UpdateHooks};
use crate::pool::{Candidate, MirrorPool};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Idle,
    /// Checking the administrative switch.
    CheckEnabled,
    /// Fetching and verifying a manifest from one mirror.
    MirrorAttempt,
    /// Consulting the rollout gate.
    GateDecision,
    /// Terminal.
    Done,
}

/// What happened on one mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    /// The download stage failed.
    FetchFailed {
        /// Failure description.
        reason: String,
    },
    /// Too few distinct valid signatures.
    Untrusted {
        /// Distinct valid signatures found.
        valid: usize,
        /// Signatures required.
        required: usize,
    },
    /// The rollout gate said "not yet".
    Deferred {
        /// Probability the gate computed.
        probability: f64,
    },
    /// The upgrade stage failed.
    ApplyFailed {
        /// Failure description.
        reason: String,
    },
    /// The update was applied.
    Applied,
}

/// One mirror attempt in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorAttempt {
    /// Mirror location.
    pub mirror: String,
    /// Result of the attempt.
    pub result: AttemptResult,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Updates are disabled and not forced.
    Disabled,
    /// A trusted manifest was found but the rollout gate deferred.
    Deferred {
        /// Mirror that served the manifest.
        mirror: String,
    },
    /// An update was applied.
    Updated {
        /// Mirror that served the manifest.
        mirror: String,
    },
    /// Every mirror failed ("no usable mirror found").
    Exhausted,
}

impl RunOutcome {
    /// `true` only for [`RunOutcome::Exhausted`]. Disabled and deferred
    /// runs are expected steady states, not failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// Record of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Identifier used in every log line of the run.
    pub run_id: Uuid,
    /// Terminal state.
    pub outcome: RunOutcome,
    /// Attempts in the order they were made.
    pub attempts: Vec<MirrorAttempt>,
}

impl RunReport {
    /// How many times `mirror` was attempted.
    pub fn attempts_on(&self, mirror: &str) -> usize {
        self.attempts.iter().filter(|a| a.mirror == mirror).count()
    }
}

enum Step {
    Failed(AttemptResult),
    Deferred(f64),
    Applied,
}

/// Runs one update attempt loop over the configured mirrors.
pub struct Orchestrator<'a, H, C, V, R> {
    settings: &'a Settings,
    hooks: H,
    clock: C,
    verifier: V,
    rng: R,
    run_id: Uuid,
    phase: Phase,
}

impl<'a, H, C, V, R> Orchestrator<'a, H, C, V, R>
where
    H: UpdateHooks,
    C: Clock,
    V: SignatureVerifier,
    R: Rng,
{
    /// Prepare a run. `rng` drives both mirror selection and the rollout
    /// coin flip.
    pub fn new(settings: &'a Settings, hooks: H, clock: C, verifier: V, rng: R) -> Self {
        Self {
            settings,
            hooks,
            clock,
            verifier,
            rng,
            run_id: Uuid::new_v4(),
            phase: Phase::Idle,
        }
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// [`RunError`] only for environment failures that make the run
    /// meaningless (no mirrors, unreadable uptime). Per-mirror failures are
    /// recorded in the report instead.
    pub fn run(mut self) -> Result<RunReport, RunError> {
        let span = tracing::info_span!("run", run_id = %self.run_id, branch = self.settings.branch());
        let _enter = span.enter();

        let mut attempts = Vec::new();

        self.enter(Phase::CheckEnabled);
        if !self.settings.updates_permitted() {
            tracing::info!("autoupdater is disabled");
            return Ok(self.finish(RunOutcome::Disabled, attempts));
        }

        let mut pool = MirrorPool::new(self.settings.mirrors().iter().cloned())?;

        while let Some(candidate) = pool.next(&mut self.rng) {
            self.enter(Phase::MirrorAttempt);
            tracing::info!(
                mirror = candidate.mirror(),
                remaining = pool.remaining(),
                "trying mirror"
            );

            match self.attempt(&candidate)? {
                Step::Failed(result) => {
                    pool.mark_failed(&candidate);
                    attempts.push(MirrorAttempt {
                        mirror: candidate.mirror().to_string(),
                        result,
                    });
                }
                Step::Deferred(probability) => {
                    attempts.push(MirrorAttempt {
                        mirror: candidate.mirror().to_string(),
                        result: AttemptResult::Deferred { probability },
                    });
                    let outcome = RunOutcome::Deferred {
                        mirror: candidate.mirror().to_string(),
                    };
                    return Ok(self.finish(outcome, attempts));
                }
                Step::Applied => {
                    pool.mark_succeeded();
                    attempts.push(MirrorAttempt {
                        mirror: candidate.mirror().to_string(),
                        result: AttemptResult::Applied,
                    });
                    let outcome = RunOutcome::Updated {
                        mirror: candidate.mirror().to_string(),
                    };
                    return Ok(self.finish(outcome, attempts));
                }
            }
        }

        tracing::error!("no usable mirror found");
        Ok(self.finish(RunOutcome::Exhausted, attempts))
    }

    fn attempt(&mut self, candidate: &Candidate) -> Result<Step, RunError> {
        let mirror = candidate.mirror();

        let manifest = match self.hooks.download(mirror) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(mirror, error = %e, "unable to fetch manifest");
                return Ok(Step::Failed(AttemptResult::FetchFailed {
                    reason: e.to_string(),
                }));
            }
        };
        tracing::debug!(
            mirror,
            digest = %manifest.digest(),
            published = %manifest.publish_date(),
            priority = %manifest.priority(),
            "fetched manifest"
        );

        let verdict = trust::evaluate(
            &manifest,
            self.settings.public_keys(),
            self.settings.signature_threshold(),
            &self.verifier,
        );
        if !verdict.is_trusted() {
            tracing::warn!(
                mirror,
                valid_signatures = verdict.valid_count(),
                required = verdict.required,
                "not enough valid signatures"
            );
            if let Err(e) = self.hooks.abort(&manifest) {
                tracing::warn!(mirror, error = %e, "abort stage reported failure");
            }
            return Ok(Step::Failed(AttemptResult::Untrusted {
                valid: verdict.valid_count(),
                required: verdict.required,
            }));
        }

        self.enter(Phase::GateDecision);
        let probability = self.rollout_probability(&manifest)?;
        if !gate::decide(probability, self.rng.gen::<f64>()) {
            tracing::info!(mirror, probability, "rollout gate says not yet");
            return Ok(Step::Deferred(probability));
        }
        tracing::info!(mirror, probability, "applying update");

        match self.hooks.apply(mirror, manifest) {
            Ok(()) => Ok(Step::Applied),
            Err(e) => {
                tracing::warn!(mirror, error = %e, "update failed");
                Ok(Step::Failed(AttemptResult::ApplyFailed {
                    reason: e.to_string(),
                }))
            }
        }
    }

    fn rollout_probability(&self, manifest: &Manifest) -> Result<f64, RunError> {
        let now = self.clock.now();
        let published = manifest.publish_date();

        // Uptime only matters when the manifest is dated in the future.
        let uptime_secs = if gate::is_clock_skewed(published, now) {
            tracing::warn!(%published, %now, "clock seems to be incorrect");
            self.clock.uptime()?.as_secs_f64()
        } else {
            0.0
        };

        let assessment = gate::assess(
            published,
            manifest.priority(),
            self.settings.fallback(),
            now,
            uptime_secs,
        );
        tracing::debug!(
            regime = ?assessment.regime,
            elapsed_secs = assessment.elapsed_secs,
            probability = assessment.probability,
            "rollout assessment"
        );
        Ok(assessment.probability)
    }

    fn enter(&mut self, phase: Phase) {
        tracing::trace!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    fn finish(&mut self, outcome: RunOutcome, attempts: Vec<MirrorAttempt>) -> RunReport {
        self.enter(Phase::Done);
        RunReport {
            run_id: self.run_id,
            outcome,
            attempts,
        }
    }
}

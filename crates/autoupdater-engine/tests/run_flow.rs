//! # End-to-end runs of the update orchestrator
//!
//! Scripted hooks stand in for the download/abort/upgrade stages, a fixed
//! clock stands in for the device, and seeded generators make mirror order
//! and coin flips reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use autoupdater_core::{Manifest, ManifestBody, ManifestSignature, Priority, Settings, Timestamp};
use autoupdater_crypto::{Ed25519KeyPair, Ed25519Verifier};
use autoupdater_engine::{
    AttemptResult, Clock, ClockError, HookError, Orchestrator, RunError, RunOutcome, RunReport,
    Stage, UpdateHooks,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

// =========================================================================
// Fixtures
// =========================================================================

const PUBLISHED: &str = "2026-01-15T12:00:00Z";

fn signer(seed: u8) -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed(&[seed; 32])
}

fn manifest(tag: &str, date: &str, priority: f64, signers: &[&Ed25519KeyPair]) -> Manifest {
    let body = ManifestBody {
        branch: "stable".to_string(),
        date: Timestamp::parse(date).unwrap(),
        priority: Priority::new(priority).unwrap(),
        payload: json!({ "image": format!("{tag}.bin") }),
    };
    let message = body.canonical_bytes().unwrap();
    let signatures = signers
        .iter()
        .map(|kp| ManifestSignature::new(kp.public_key().to_hex(), kp.sign(&message).as_bytes().to_vec()))
        .collect();
    Manifest::new(body, signatures).unwrap()
}

/// A manifest that any run will apply immediately.
fn release(tag: &str) -> Manifest {
    manifest(tag, PUBLISHED, 0.0, &[&signer(1)])
}

fn settings(mirrors: &[&str]) -> Settings {
    Settings::builder("stable")
        .enabled(true)
        .mirrors(mirrors.iter().copied())
        .public_keys([signer(1).public_key().to_hex(), signer(2).public_key().to_hex()])
        .signature_threshold(1)
        .build()
        .unwrap()
}

#[derive(Default)]
struct ScriptedHooks {
    served: BTreeMap<String, Manifest>,
    broken_upgrade: BTreeSet<String>,
    downloads: Vec<String>,
    aborted: Vec<Manifest>,
    applied: Vec<(String, Manifest)>,
}

impl ScriptedHooks {
    fn serve(mut self, mirror: &str, manifest: Manifest) -> Self {
        self.served.insert(mirror.to_string(), manifest);
        self
    }

    fn break_upgrade(mut self, mirror: &str) -> Self {
        self.broken_upgrade.insert(mirror.to_string());
        self
    }
}

impl UpdateHooks for ScriptedHooks {
    fn download(&mut self, mirror: &str) -> Result<Manifest, HookError> {
        self.downloads.push(mirror.to_string());
        self.served.get(mirror).cloned().ok_or_else(|| HookError::Failed {
            stage: Stage::Download,
            reason: "connection refused".to_string(),
        })
    }

    fn abort(&mut self, manifest: &Manifest) -> Result<(), HookError> {
        self.aborted.push(manifest.clone());
        Err(HookError::Failed {
            stage: Stage::Abort,
            reason: "ignored".to_string(),
        })
    }

    fn apply(&mut self, mirror: &str, manifest: Manifest) -> Result<(), HookError> {
        if self.broken_upgrade.contains(mirror) {
            return Err(HookError::Failed {
                stage: Stage::Upgrade,
                reason: "flash write error".to_string(),
            });
        }
        self.applied.push((mirror.to_string(), manifest));
        Ok(())
    }
}

struct FixedClock {
    now: Timestamp,
    uptime: Option<Duration>,
}

impl FixedClock {
    fn at(s: &str) -> Self {
        Self {
            now: Timestamp::parse(s).unwrap(),
            uptime: Some(Duration::from_secs(3_600)),
        }
    }

    fn with_uptime(mut self, uptime: Option<Duration>) -> Self {
        self.uptime = uptime;
        self
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn uptime(&self) -> Result<Duration, ClockError> {
        self.uptime
            .ok_or_else(|| ClockError::UptimeUnavailable("no uptime source".to_string()))
    }
}

fn run(settings: &Settings, hooks: &mut ScriptedHooks, clock: FixedClock, seed: u64) -> Result<RunReport, RunError> {
    Orchestrator::new(settings, hooks, clock, Ed25519Verifier, StdRng::seed_from_u64(seed)).run()
}

// =========================================================================
// Failover
// =========================================================================

#[test]
fn fetch_failure_fails_over_without_retry() {
    let settings = settings(&["M1", "M2"]);
    let m2 = release("m2");
    let mut m1_first = 0;

    for seed in 0..64 {
        let mut hooks = ScriptedHooks::default().serve("M2", m2.clone());
        let report = run(&settings, &mut hooks, FixedClock::at("2026-02-01T00:00:00Z"), seed).unwrap();

        assert_eq!(report.outcome, RunOutcome::Updated { mirror: "M2".to_string() }, "seed {seed}");
        assert_eq!(hooks.applied, vec![("M2".to_string(), m2.clone())], "seed {seed}");
        assert!(report.attempts_on("M1") <= 1, "seed {seed}");
        assert_eq!(report.attempts_on("M2"), 1, "seed {seed}");
        if hooks.downloads.first().map(String::as_str) == Some("M1") {
            m1_first += 1;
            assert_eq!(hooks.downloads, ["M1", "M2"]);
            assert!(matches!(report.attempts[0].result, AttemptResult::FetchFailed { .. }));
        }
    }
    assert!(m1_first > 0, "M1 was never selected first");
    assert!(m1_first < 64, "M2 was never selected first");
}

#[test]
fn every_failing_mirror_is_tried_once_then_exhausted() {
    let settings = settings(&["A", "B", "C"]);
    for seed in 0..32 {
        let mut hooks = ScriptedHooks::default();
        let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), seed).unwrap();

        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert!(report.outcome.is_failure());
        let mut tried = hooks.downloads.clone();
        tried.sort();
        assert_eq!(tried, ["A", "B", "C"], "seed {seed}");
        assert!(hooks.applied.is_empty());
    }
}

#[test]
fn upgrade_failure_fails_over() {
    let settings = settings(&["M1", "M2"]);
    for seed in 0..16 {
        let mut hooks = ScriptedHooks::default()
            .serve("M1", release("m1"))
            .serve("M2", release("m2"))
            .break_upgrade("M1");
        let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), seed).unwrap();

        assert_eq!(report.outcome, RunOutcome::Updated { mirror: "M2".to_string() });
        assert_eq!(hooks.applied.len(), 1);
        assert!(report.attempts.iter().all(|a| a.mirror != "M1"
            || matches!(a.result, AttemptResult::ApplyFailed { .. })));
    }
}

// =========================================================================
// Trust
// =========================================================================

#[test]
fn untrusted_manifest_is_aborted_and_never_applied() {
    let settings = settings(&["M1", "M2"]);
    let stranger = signer(9);
    let forged = manifest("forged", PUBLISHED, 0.0, &[&stranger]);

    for seed in 0..16 {
        let mut hooks = ScriptedHooks::default()
            .serve("M1", forged.clone())
            .serve("M2", release("m2"));
        let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), seed).unwrap();

        assert_eq!(report.outcome, RunOutcome::Updated { mirror: "M2".to_string() });
        assert_eq!(hooks.aborted.len(), report.attempts_on("M1"));
        assert!(hooks.applied.iter().all(|(m, _)| m == "M2"));
        for attempt in report.attempts.iter().filter(|a| a.mirror == "M1") {
            assert_eq!(attempt.result, AttemptResult::Untrusted { valid: 0, required: 1 });
        }
    }
}

#[test]
fn threshold_counts_distinct_trusted_signers() {
    let settings = Settings::builder("stable")
        .enabled(true)
        .mirrors(["M1"])
        .public_keys([signer(1).public_key().to_hex(), signer(2).public_key().to_hex()])
        .signature_threshold(2)
        .build()
        .unwrap();

    let one = manifest("one", PUBLISHED, 0.0, &[&signer(1), &signer(1)]);
    let mut hooks = ScriptedHooks::default().serve("M1", one);
    let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), 1).unwrap();
    assert_eq!(report.outcome, RunOutcome::Exhausted);
    assert_eq!(report.attempts[0].result, AttemptResult::Untrusted { valid: 1, required: 2 });

    let both = manifest("both", PUBLISHED, 0.0, &[&signer(1), &signer(2)]);
    let mut hooks = ScriptedHooks::default().serve("M1", both);
    let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), 1).unwrap();
    assert_eq!(report.outcome, RunOutcome::Updated { mirror: "M1".to_string() });
}

// =========================================================================
// Rollout gate
// =========================================================================

#[test]
fn gate_deferral_ends_the_run_without_marking_failure() {
    let settings = settings(&["M1", "M2"]);
    let fresh = manifest("fresh", PUBLISHED, 7.0, &[&signer(1)]);
    let mut hooks = ScriptedHooks::default()
        .serve("M1", fresh.clone())
        .serve("M2", fresh);
    let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), 5).unwrap();

    assert!(matches!(report.outcome, RunOutcome::Deferred { .. }));
    assert!(!report.outcome.is_failure());
    assert_eq!(hooks.downloads.len(), 1);
    assert!(hooks.applied.is_empty());
    assert!(hooks.aborted.is_empty());
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.attempts[0].result, AttemptResult::Deferred { probability: 0.0 });
}

#[test]
fn skewed_clock_with_fresh_boot_defers() {
    let settings = settings(&["M1"]);
    let mut hooks = ScriptedHooks::default().serve("M1", release("future"));
    let clock = FixedClock::at("2026-01-15T11:00:00Z").with_uptime(Some(Duration::from_secs(599)));
    let report = run(&settings, &mut hooks, clock, 3).unwrap();

    assert_eq!(report.outcome, RunOutcome::Deferred { mirror: "M1".to_string() });
}

#[test]
fn skewed_clock_after_settling_applies_immediate_release() {
    let settings = settings(&["M1"]);
    let mut hooks = ScriptedHooks::default().serve("M1", release("future"));
    let clock = FixedClock::at("2026-01-15T11:00:00Z").with_uptime(Some(Duration::from_secs(600)));
    let report = run(&settings, &mut hooks, clock, 3).unwrap();

    assert_eq!(report.outcome, RunOutcome::Updated { mirror: "M1".to_string() });
}

#[test]
fn unreadable_uptime_aborts_the_run() {
    let settings = settings(&["M1"]);
    let mut hooks = ScriptedHooks::default().serve("M1", release("future"));
    let clock = FixedClock::at("2026-01-15T11:00:00Z").with_uptime(None);
    let err = run(&settings, &mut hooks, clock, 3).unwrap_err();

    assert!(matches!(err, RunError::Clock(ClockError::UptimeUnavailable(_))));
    assert!(hooks.applied.is_empty());
}

#[test]
fn uptime_is_not_needed_for_a_sane_clock() {
    let settings = settings(&["M1"]);
    let mut hooks = ScriptedHooks::default().serve("M1", release("past"));
    let clock = FixedClock::at("2026-03-01T00:00:00Z").with_uptime(None);
    let report = run(&settings, &mut hooks, clock, 3).unwrap();

    assert_eq!(report.outcome, RunOutcome::Updated { mirror: "M1".to_string() });
}

#[test]
fn fallback_waits_a_day_past_the_window() {
    let settings = Settings::builder("stable")
        .enabled(true)
        .fallback(true)
        .mirrors(["M1"])
        .public_keys([signer(1).public_key().to_hex()])
        .signature_threshold(1)
        .build()
        .unwrap();
    let weekly = manifest("weekly", PUBLISHED, 1.0, &[&signer(1)]);

    let mut hooks = ScriptedHooks::default().serve("M1", weekly.clone());
    let report = run(&settings, &mut hooks, FixedClock::at("2026-01-17T11:59:59Z"), 0).unwrap();
    assert!(matches!(report.outcome, RunOutcome::Deferred { .. }));

    let mut hooks = ScriptedHooks::default().serve("M1", weekly);
    let report = run(&settings, &mut hooks, FixedClock::at("2026-01-17T12:00:00Z"), 0).unwrap();
    assert!(matches!(report.outcome, RunOutcome::Updated { .. }));
}

// =========================================================================
// Enable switch
// =========================================================================

#[test]
fn disabled_run_never_downloads() {
    let settings = Settings::builder("stable")
        .enabled(false)
        .mirrors(["M1"])
        .public_keys([signer(1).public_key().to_hex()])
        .signature_threshold(1)
        .build()
        .unwrap();
    let mut hooks = ScriptedHooks::default().serve("M1", release("m1"));
    let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), 0).unwrap();

    assert_eq!(report.outcome, RunOutcome::Disabled);
    assert!(!report.outcome.is_failure());
    assert!(hooks.downloads.is_empty());
    assert!(report.attempts.is_empty());
}

#[test]
fn force_overrides_disabled() {
    let settings = Settings::builder("stable")
        .enabled(false)
        .force(true)
        .mirrors(["M1"])
        .public_keys([signer(1).public_key().to_hex()])
        .signature_threshold(1)
        .build()
        .unwrap();
    let mut hooks = ScriptedHooks::default().serve("M1", release("m1"));
    let report = run(&settings, &mut hooks, FixedClock::at(PUBLISHED), 0).unwrap();

    assert_eq!(report.outcome, RunOutcome::Updated { mirror: "M1".to_string() });
}

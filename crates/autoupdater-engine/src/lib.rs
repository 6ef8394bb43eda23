//! # autoupdater-engine: Decision and Failover Engine
//!
//! Decides whether this device should update now, where to fetch the update
//! from, and whether the fetched manifest can be trusted. The actual work of
//! fetching, cleaning up and flashing is delegated to [`UpdateHooks`].
//!
//! ## Modules
//!
//! - [`gate`]: the staged rollout probability curve.
//! - [`pool`]: randomized mirror selection with permanent removal on failure.
//! - [`hooks`]: collaborator traits for the download/abort/upgrade stages
//!   and the device clock.
//! - [`orchestrator`]: the end-to-end attempt loop.
//!
//! The engine is single-threaded and synchronous. It never retries a mirror
//! within one run; retry policy belongs to whatever schedules the runs.

pub mod error;
pub mod gate;
pub mod hooks;
pub mod orchestrator;
pub mod pool;

pub use error::{ClockError, HookError, PoolError, RunError, Stage};
pub use hooks::{Clock, UpdateHooks};
pub use orchestrator::{AttemptResult, MirrorAttempt, Orchestrator, Phase, RunOutcome, RunReport};
pub use pool::{Candidate, MirrorPool};

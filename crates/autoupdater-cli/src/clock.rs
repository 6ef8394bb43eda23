//! # Device Clock and Randomness
//!
//! Wall-clock time and uptime for the rollout gate, and the one random
//! number generator a run uses for mirror order and the rollout coin flip.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::time::{clock_gettime, ClockId};
use rand::rngs::StdRng;
use rand::SeedableRng;

use autoupdater_core::Timestamp;
use autoupdater_engine::{Clock, ClockError};

/// Kernel uptime source.
pub const PROC_UPTIME: &str = "/proc/uptime";

/// System wall clock with uptime read from `/proc/uptime`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    uptime_source: PathBuf,
}

impl SystemClock {
    /// Clock reading uptime from an alternative file in `/proc/uptime`
    /// format.
    pub fn with_uptime_source(path: impl Into<PathBuf>) -> Self {
        Self {
            uptime_source: path.into(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::with_uptime_source(PROC_UPTIME)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn uptime(&self) -> Result<Duration, ClockError> {
        read_uptime(&self.uptime_source)
    }
}

fn read_uptime(path: &Path) -> Result<Duration, ClockError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ClockError::UptimeUnavailable(format!("{}: {e}", path.display())))?;
    parse_uptime(&text)
}

/// Parse the first field of `/proc/uptime` ("seconds since boot").
pub fn parse_uptime(text: &str) -> Result<Duration, ClockError> {
    let field = text
        .split_whitespace()
        .next()
        .ok_or_else(|| ClockError::UptimeUnavailable("empty uptime".to_string()))?;
    let secs: f64 = field
        .parse()
        .map_err(|_| ClockError::UptimeUnavailable(format!("unparseable uptime '{field}'")))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ClockError::UptimeUnavailable(format!("uptime '{field}': {e}")))
}

/// Generator for one run, seeded from the monotonic clock.
pub fn seed_rng() -> Result<StdRng, nix::Error> {
    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
    let seed = ((ts.tv_sec() as u64) << 32) ^ ts.tv_nsec() as u64;
    Ok(StdRng::seed_from_u64(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_proc_uptime_format() {
        let uptime = parse_uptime("350735.47 234388.90\n").unwrap();
        assert_eq!(uptime.as_secs(), 350_735);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("soon").is_err());
        assert!(parse_uptime("-5.0 1.0").is_err());
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let clock = SystemClock::with_uptime_source(dir.path().join("uptime"));
        assert!(matches!(clock.uptime(), Err(ClockError::UptimeUnavailable(_))));
    }

    #[test]
    fn test_alternative_source_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uptime");
        std::fs::write(&path, "601.00 12.00\n").unwrap();
        let clock = SystemClock::with_uptime_source(&path);
        assert_eq!(clock.uptime().unwrap(), Duration::from_secs(601));
    }

    #[test]
    fn test_rng_seeds() {
        assert!(seed_rng().is_ok());
    }
}

//! # Staged Rollout Gate
//!
//! Maps a manifest's publish date and priority to the probability that this
//! device updates on this run. Across a fleet of devices polling on a timer
//! this spreads a release over `priority` days instead of a flag day.
//!
//! Let `diff = now - publish_date` and `window = priority * 86400` seconds.
//!
//! ```text
//! diff < 0, uptime < 600s     → 0            clock probably not synced yet
//! diff < 0, uptime >= 600s    → 0.75^priority
//! fallback, diff >= 0         → 1 iff diff >= window + 86400, else 0
//! normal,   diff >= window    → 1
//! normal,   otherwise         → 3x² − 2x³ where x = diff / window
//! ```
//!
//! The smoothstep curve is the lowest-degree polynomial that is 0 at 0,
//! 1 at 1, and flat at both ends: a slow start, fast middle, slow finish.
//!
//! When `priority == 0` the window is empty, `diff >= window` always holds
//! for a non-negative `diff`, and the division is never reached.

use autoupdater_core::{Priority, Timestamp};
use rand::Rng;

/// Seconds per day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Below this uptime a future-dated manifest defers the decision.
pub const MIN_SYNCED_UPTIME_SECS: f64 = 600.0;

/// Per-day decay of the update probability when the clock cannot be trusted.
pub const SKEWED_CLOCK_BASE: f64 = 0.75;

/// Which branch of the policy produced a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRegime {
    /// The manifest claims a publish date in the future.
    ClockSkew,
    /// Delayed-certainty step function.
    Fallback,
    /// Smooth interpolation over the rollout window.
    Normal,
}

/// Probability of updating now, together with how it was derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloutAssessment {
    /// Probability in `[0, 1]`.
    pub probability: f64,
    /// Policy branch taken.
    pub regime: GateRegime,
    /// `now - publish_date` in seconds.
    pub elapsed_secs: i64,
}

/// Whether the publish date lies after `now`.
pub fn is_clock_skewed(publish_date: Timestamp, now: Timestamp) -> bool {
    now.seconds_since(&publish_date) < 0
}

/// The smoothstep curve `3x² − 2x³`.
pub fn smoothstep(x: f64) -> f64 {
    x * x * (3.0 - 2.0 * x)
}

/// Evaluate the rollout policy.
///
/// `uptime_secs` is only consulted when the publish date lies in the future.
pub fn assess(
    publish_date: Timestamp,
    priority: Priority,
    fallback: bool,
    now: Timestamp,
    uptime_secs: f64,
) -> RolloutAssessment {
    let diff = now.seconds_since(&publish_date);
    let window = priority.window_secs();

    let (probability, regime) = if diff < 0 {
        let p = if uptime_secs < MIN_SYNCED_UPTIME_SECS {
            0.0
        } else {
            SKEWED_CLOCK_BASE.powf(priority.days())
        };
        (p, GateRegime::ClockSkew)
    } else if fallback {
        let p = if diff as f64 >= window + SECONDS_PER_DAY { 1.0 } else { 0.0 };
        (p, GateRegime::Fallback)
    } else if diff as f64 >= window {
        (1.0, GateRegime::Normal)
    } else {
        (smoothstep(diff as f64 / window), GateRegime::Normal)
    };

    RolloutAssessment {
        probability,
        regime,
        elapsed_secs: diff,
    }
}

/// Probability in `[0, 1]` that this device updates now.
pub fn rollout_probability(
    publish_date: Timestamp,
    priority: Priority,
    fallback: bool,
    now: Timestamp,
    uptime_secs: f64,
) -> f64 {
    assess(publish_date, priority, fallback, now, uptime_secs).probability
}

/// Turn a probability into a decision using a uniform draw from `[0, 1)`.
///
/// Probability 1 always says yes and probability 0 always says no.
pub fn decide(probability: f64, draw: f64) -> bool {
    draw < probability
}

/// Coin flip against [`rollout_probability`].
pub fn should_update_now<R: Rng + ?Sized>(
    publish_date: Timestamp,
    priority: Priority,
    fallback: bool,
    now: Timestamp,
    uptime_secs: f64,
    rng: &mut R,
) -> bool {
    let p = rollout_probability(publish_date, priority, fallback, now, uptime_secs);
    decide(p, rng.gen::<f64>())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const PUBLISHED: i64 = 1_768_478_400;

    proptest! {
        /// Once the window has elapsed the normal policy always says yes.
        #[test]
        fn elapsed_window_always_certain(days in 0.0f64..60.0, extra in 0i64..10_000_000) {
            let priority = Priority::new(days).unwrap();
            let diff = priority.window_secs().ceil() as i64 + extra;
            let publish = Timestamp::from_epoch_secs(PUBLISHED).unwrap();
            let now = Timestamp::from_epoch_secs(PUBLISHED + diff).unwrap();
            prop_assert_eq!(rollout_probability(publish, priority, false, now, 0.0), 1.0);
        }

        /// Smoothstep is non-decreasing on [0, 1).
        #[test]
        fn smoothstep_monotone(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(smoothstep(lo) <= smoothstep(hi));
        }

        /// Probability always lies in [0, 1].
        #[test]
        fn probability_in_unit_interval(
            days in 0.0f64..30.0,
            diff in -1_000_000i64..5_000_000,
            fallback in any::<bool>(),
            uptime in 0.0f64..100_000.0,
        ) {
            let publish = Timestamp::from_epoch_secs(PUBLISHED).unwrap();
            let now = Timestamp::from_epoch_secs(PUBLISHED + diff).unwrap();
            let p = rollout_probability(publish, Priority::new(days).unwrap(), fallback, now, uptime);
            prop_assert!((0.0..=1.0).contains(&p));
        }

        /// The skewed-clock probability strictly decreases with priority.
        #[test]
        fn skew_probability_decreasing(a in 0.0f64..20.0, delta in 0.01f64..20.0) {
            let publish = Timestamp::from_epoch_secs(PUBLISHED).unwrap();
            let now = Timestamp::from_epoch_secs(PUBLISHED - 60).unwrap();
            let low = rollout_probability(publish, Priority::new(a).unwrap(), false, now, 1_000.0);
            let high = rollout_probability(publish, Priority::new(a + delta).unwrap(), false, now, 1_000.0);
            prop_assert!(high < low);
        }
    }

    #[test]
    fn test_smoothstep_endpoints_and_derivative() {
        let derivative = |x: f64| 6.0 * x - 6.0 * x * x;
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(derivative(0.0), 0.0);
        assert_eq!(derivative(1.0), 0.0);
        assert!(smoothstep(0.999_999) > 0.999_99);
    }
}

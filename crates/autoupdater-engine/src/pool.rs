//! # Mirror Failover Selector
//!
//! Visits every configured mirror at most once per run, in uniformly random
//! order, so that load spreads across mirrors and an unreachable first
//! mirror does not block the fleet.
//!
//! Mirrors stay in place for the whole run; a failed mirror is only tagged
//! dead. Each [`MirrorPool::next`] draws `i` uniformly from the live count
//! `k` and walks forward to the `i`-th live entry. Consuming the pool this
//! way yields a uniformly random permutation of the original list.

use rand::Rng;

use crate::error::PoolError;

#[derive(Debug, Clone)]
struct Slot {
    mirror: String,
    failed: bool,
}

/// A mirror handed out by [`MirrorPool::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    index: usize,
    mirror: String,
}

impl Candidate {
    /// Mirror location.
    pub fn mirror(&self) -> &str {
        &self.mirror
    }

    /// Position of the mirror in the configured list.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Working set of mirrors for one run. Only ever shrinks.
#[derive(Debug, Clone)]
pub struct MirrorPool {
    slots: Vec<Slot>,
    live: usize,
    finished: bool,
}

impl MirrorPool {
    /// Build a pool from the configured mirror list.
    ///
    /// # Errors
    ///
    /// [`PoolError::Empty`] if `mirrors` is empty.
    pub fn new<I, S>(mirrors: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots: Vec<Slot> = mirrors
            .into_iter()
            .map(|m| Slot {
                mirror: m.into(),
                failed: false,
            })
            .collect();
        if slots.is_empty() {
            return Err(PoolError::Empty);
        }
        let live = slots.len();
        Ok(Self {
            slots,
            live,
            finished: false,
        })
    }

    /// Pick a uniformly random live mirror.
    ///
    /// Returns `None` once a mirror succeeded or every mirror has failed.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Candidate> {
        if self.finished || self.live == 0 {
            return None;
        }
        let i = rng.gen_range(0..self.live);
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.failed)
            .nth(i)
            .map(|(index, slot)| Candidate {
                index,
                mirror: slot.mirror.clone(),
            })
    }

    /// Permanently remove a mirror from this run. Repeated calls for the
    /// same candidate have no further effect.
    pub fn mark_failed(&mut self, candidate: &Candidate) {
        if let Some(slot) = self.slots.get_mut(candidate.index) {
            if !slot.failed {
                slot.failed = true;
                self.live -= 1;
            }
        }
    }

    /// An attempt succeeded: stop handing out mirrors.
    pub fn mark_succeeded(&mut self) {
        self.finished = true;
    }

    /// Number of mirrors not yet marked failed.
    pub fn remaining(&self) -> usize {
        self.live
    }

    /// Number of mirrors the pool was built with.
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// `true` when every mirror has failed ("no usable mirror found").
    pub fn is_exhausted(&self) -> bool {
        self.live == 0
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    proptest! {
        /// Failing every attempt consumes a permutation of the input.
        #[test]
        fn exhaustion_is_a_permutation(n in 1usize..20, seed in any::<u64>()) {
            let mirrors: Vec<String> = (0..n).map(|i| format!("http://m{i}")).collect();
            let mut pool = MirrorPool::new(mirrors.clone()).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut seen = Vec::new();
            while let Some(c) = pool.next(&mut rng) {
                prop_assert_eq!(pool.remaining(), n - seen.len());
                seen.push(c.index());
                pool.mark_failed(&c);
            }
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());
            prop_assert!(pool.is_exhausted());
        }
    }
}

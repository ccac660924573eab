use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::HashSet;

/// Deterministic, collision-free seed stream for one batch.
///
/// The `n`-th seed is the `n`-th distinct value drawn from a ChaCha20 stream
/// keyed by the base seed, so a run's seed depends only on
/// `(base_seed, run_index)`.
#[derive(Debug, Clone)]
pub struct SeedSequence {
    rng: ChaCha20Rng,
    seen: HashSet<u64>,
}

impl SeedSequence {
    #[must_use]
    pub fn new(base_seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(base_seed),
            seen: HashSet::new(),
        }
    }

    /// The first `count` seeds of the stream for `base_seed`.
    #[must_use]
    pub fn take_distinct(base_seed: u64, count: usize) -> Vec<u64> {
        Self::new(base_seed).take(count).collect()
    }
}

impl Iterator for SeedSequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            let candidate = self.rng.next_u64();
            if self.seen.insert(candidate) {
                return Some(candidate);
            }
        }
    }
}

/// Parse a seed given as decimal or `0x`-prefixed hexadecimal.
///
/// Negative decimals map to their magnitude, matching how seeds are usually
/// copied out of other tools.
#[must_use]
pub fn parse_seed(token: &str) -> Option<u64> {
    let token = token.trim();
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(&hex.replace('_', ""), 16).ok();
    }
    if let Ok(value) = token.parse::<u64>() {
        return Some(value);
    }
    token.parse::<i64>().ok().map(i64::unsigned_abs)
}

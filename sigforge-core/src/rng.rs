//! Deterministic RNG hierarchy for parameter search.
//!
//! A master seed is expanded into per-(scope, round, draw) sub-seeds with
//! BLAKE3. Derivation is hash-based, so the seeds do not depend on the order
//! or thread in which candidates are drawn.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for one draw. `scope` is usually the strategy name and
    /// `round` the optimization round for that strategy.
    pub fn sub_seed(&self, scope: &str, round: u64, draw: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&round.to_le_bytes());
        hasher.update(&draw.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, scope: &str, round: u64, draw: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, round, draw))
    }
}

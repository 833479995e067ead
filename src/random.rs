//! Explicit, splittable seeds.
//!
//! Randomness is never drawn from shared state: every operation that samples takes a [`Seed`],
//! and derives independent child seeds from it by splitting. Equal seeds give bit-identical draws.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A reproducible source of randomness that can be split into independent children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed(u64);

impl Seed {
    pub fn new(seed: u64) -> Seed {
        Seed(seed)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Split into two independent seeds.
    pub fn split(&self) -> (Seed, Seed) {
        let mut rng = self.rng();
        (Seed(rng.gen()), Seed(rng.gen()))
    }

    /// Split into `n` independent seeds.
    pub fn split_n(&self, n: usize) -> Vec<Seed> {
        let mut rng = self.rng();
        (0..n).map(|_| Seed(rng.gen())).collect()
    }

    /// A generator seeded from this seed.
    ///
    /// Use each seed for a single generator; split first if more than one stream is needed.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.0)
    }
}

impl From<u64> for Seed {
    fn from(seed: u64) -> Self {
        Seed(seed)
    }
}

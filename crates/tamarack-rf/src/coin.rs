//! Seeding: the weighted coin and the master seed sequence.

use std::sync::{LazyLock, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A biased coin for without-replacement subsampling.
///
/// Flipping with the number of picks still needed and the number of items
/// still ahead selects exactly K items out of M, uniformly at random, in a
/// single left-to-right pass.
#[derive(Debug, Clone)]
pub struct WeightedCoin {
    rng: ChaCha8Rng,
}

impl WeightedCoin {
    /// Create a coin from a seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Reinitialize the internal random engine.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Return `true` with probability `remaining_picks / remaining_items`.
    #[inline]
    pub fn flip(&mut self, remaining_picks: usize, remaining_items: usize) -> bool {
        if remaining_picks == 0 {
            return false;
        }
        if remaining_picks >= remaining_items {
            return true;
        }
        self.rng.gen_range(0..remaining_items) < remaining_picks
    }
}

/// The process-wide master seed sequence.
///
/// Initialized from entropy; [`seed_master`] replaces it with a generator
/// seeded from a user value. All per-tree coins and the importance shuffler
/// derive their seeds from here via [`mint_seed`], never inside hot loops.
static MASTER: LazyLock<Mutex<ChaCha8Rng>> =
    LazyLock::new(|| Mutex::new(ChaCha8Rng::seed_from_u64(rand::random())));

/// Reinitialize the master seed sequence from a user-supplied seed.
pub fn seed_master(seed: u64) {
    *MASTER.lock().expect("master seed sequence poisoned") = ChaCha8Rng::seed_from_u64(seed);
}

/// Mint the next child seed from the master seed sequence.
#[must_use]
pub fn mint_seed() -> u64 {
    MASTER
        .lock()
        .expect("master seed sequence poisoned")
        .r#gen()
}

#[cfg(test)]
mod tests {
    use super::{WeightedCoin, mint_seed, seed_master};

    #[test]
    fn flip_certain_and_impossible() {
        let mut coin = WeightedCoin::from_seed(1);
        assert!(coin.flip(3, 3));
        assert!(coin.flip(5, 3));
        assert!(!coin.flip(0, 3));
    }

    #[test]
    fn one_pass_selects_exactly_k() {
        let mut coin = WeightedCoin::from_seed(7);
        for k in 0..=10usize {
            let mut picked = 0;
            let m = 10usize;
            for i in 0..m {
                if coin.flip(k - picked, m - i) {
                    picked += 1;
                }
            }
            assert_eq!(picked, k);
        }
    }

    #[test]
    fn selection_is_roughly_uniform() {
        let mut coin = WeightedCoin::from_seed(99);
        let m = 5usize;
        let k = 2usize;
        let mut hits = vec![0u32; m];
        let rounds = 20_000;
        for _ in 0..rounds {
            let mut picked = 0;
            for (i, hit) in hits.iter_mut().enumerate() {
                if coin.flip(k - picked, m - i) {
                    picked += 1;
                    *hit += 1;
                }
            }
        }
        // Each item is expected k/m of the time; allow a generous margin.
        let expected = rounds as f64 * k as f64 / m as f64;
        for &hit in &hits {
            assert!((f64::from(hit) - expected).abs() < expected * 0.1);
        }
    }

    #[test]
    fn same_seed_same_flips() {
        let mut a = WeightedCoin::from_seed(42);
        let mut b = WeightedCoin::from_seed(42);
        for _ in 0..100 {
            assert_eq!(a.flip(3, 10), b.flip(3, 10));
        }
    }

    #[test]
    fn reseeding_master_reproduces_child_seeds() {
        let _guard = crate::testutil::seed_lock();
        seed_master(1234);
        let first: Vec<u64> = (0..8).map(|_| mint_seed()).collect();
        seed_master(1234);
        let second: Vec<u64> = (0..8).map(|_| mint_seed()).collect();
        assert_eq!(first, second);
    }
}

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::SeedableRng as _;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom as _;

use crate::scenario::Endpoint;

/// Endpoint selection policy. Implementations must be safe to call from many
/// workers at once and must never fail: an empty `available` set yields `None`.
pub trait Selector: Send + Sync + std::fmt::Debug {
    fn select(&self, available: &[Endpoint]) -> Option<Endpoint>;
}

/// Uniform-random choice among available endpoints. With a seed the selection
/// sequence is reproducible across runs.
#[derive(Debug)]
pub struct UniformRandom {
    rng: Mutex<SmallRng>,
}

impl UniformRandom {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_rng(&mut rand::rng())),
        }
    }

    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl Default for UniformRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for UniformRandom {
    fn select(&self, available: &[Endpoint]) -> Option<Endpoint> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        available.choose(&mut *rng).cloned()
    }
}

/// Rotates through the available set in order.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl Selector for RoundRobin {
    fn select(&self, available: &[Endpoint]) -> Option<Endpoint> {
        if available.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % available.len();
        available.get(idx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Vec<Endpoint> {
        vec![
            Endpoint::new("localhost", 2302),
            Endpoint::new("localhost", 2308),
            Endpoint::new("localhost", 2309),
        ]
    }

    #[test]
    fn uniform_random_picks_a_member() {
        let pool = pool();
        let selector = UniformRandom::seeded(7);
        for _ in 0..100 {
            let picked = selector.select(&pool);
            assert!(picked.is_some_and(|e| pool.contains(&e)));
        }
    }

    #[test]
    fn uniform_random_returns_none_for_empty_set() {
        let selector = UniformRandom::new();
        assert!(selector.select(&[]).is_none());
    }

    #[test]
    fn seeded_selection_is_reproducible() {
        let pool = pool();
        let a = UniformRandom::seeded(42);
        let b = UniformRandom::seeded(42);

        let seq_a: Vec<_> = (0..50).map(|_| a.select(&pool)).collect();
        let seq_b: Vec<_> = (0..50).map(|_| b.select(&pool)).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn round_robin_rotates_in_order() {
        let pool = pool();
        let selector = RoundRobin::default();
        let picked: Vec<_> = (0..6).filter_map(|_| selector.select(&pool)).collect();
        assert_eq!(picked[0], pool[0]);
        assert_eq!(picked[1], pool[1]);
        assert_eq!(picked[2], pool[2]);
        assert_eq!(picked[3], pool[0]);
        assert!(selector.select(&[]).is_none());
    }
}

//! Injectable pseudo-random source for bootstrap sampling and weight
//! initialization. Tests pin a seed; production seeds from entropy.

use uuid::Uuid;

pub trait RandomSource {
    fn next_u64(&mut self) -> u64;

    /// Uniform value in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform index in `[0, bound)`. Returns 0 when `bound` is 0.
    fn next_index(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        ((self.next_f64() * bound as f64) as usize).min(bound - 1)
    }

    /// Uniform value in `[low, high)`.
    fn next_range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }
}

/// 64-bit linear congruential generator.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: seed.wrapping_add(Self::INCREMENT),
        };
        rng.step();
        rng
    }

    pub fn from_entropy() -> Self {
        let (high, low) = Uuid::new_v4().as_u64_pair();
        Self::new(high ^ low.rotate_left(17))
    }

    fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
    }
}

impl RandomSource for SeededRng {
    fn next_u64(&mut self) -> u64 {
        self.step();
        // murmur3 finalizer over the raw state
        let mut x = self.state;
        x ^= x >> 33;
        x = x.wrapping_mul(0xff51afd7ed558ccd);
        x ^= x >> 33;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn values_stay_in_range() {
        let mut rng = SeededRng::new(7);
        for _ in 0..1000 {
            let f = rng.next_f64();
            assert!((0.0..1.0).contains(&f));
            assert!(rng.next_index(5) < 5);
            let r = rng.next_range(-0.1, 0.1);
            assert!((-0.1..0.1).contains(&r));
        }
        assert_eq!(rng.next_index(0), 0);
    }
}

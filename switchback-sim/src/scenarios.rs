//! Reusable decision-trace scenarios.
//!
//! Traces are plain whitespace-separated text, exactly what the trace
//! consumer reads from disk, so a scenario can be written to a file or
//! wrapped in a cursor interchangeably.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Every tick on the same rung: the no-switch baseline.
pub fn constant_trace(rung: usize, ticks: usize) -> String {
    vec![rung.to_string(); ticks].join(" ")
}

/// Switch between rungs 0 and 1 every tick: the worst case for the
/// resynchronizer, one fixup per tick after the first.
pub fn alternating_trace(ticks: usize) -> String {
    (0..ticks)
        .map(|tick| (tick % 2).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Seeded random walk over the full ladder, reproducible by seed.
pub fn random_trace(rung_count: usize, ticks: usize, seed: u64) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..ticks)
        .map(|_| rng.random_range(0..rung_count).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_trace_repeats_one_rung() {
        assert_eq!(constant_trace(1, 4), "1 1 1 1");
    }

    #[test]
    fn alternating_trace_toggles() {
        assert_eq!(alternating_trace(5), "0 1 0 1 0");
    }

    #[test]
    fn random_trace_is_reproducible_and_in_range() {
        let a = random_trace(3, 64, 42);
        let b = random_trace(3, 64, 42);
        assert_eq!(a, b);
        assert!(
            a.split_whitespace()
                .all(|entry| entry.parse::<usize>().unwrap() < 3)
        );
    }
}

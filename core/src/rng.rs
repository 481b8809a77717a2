//! Deterministic random number generation.
//!
//! RULE: nothing in the ledger core may call a platform RNG. Every
//! probabilistic operation takes an injected [`RngSource`], so tests can
//! swap in a seeded generator and no implicit global state exists.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// The single randomness port: a uniform float in `[0, 1)`.
///
/// Derived helpers are default methods so every implementation draws the
/// same way — the draw order is part of replay determinism.
pub trait RngSource {
    fn next_f64(&mut self) -> f64;

    /// Bernoulli trial: true with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform integer in `[0, n)`. `n` must be positive.
    fn below(&mut self, n: u64) -> u64 {
        debug_assert!(n > 0, "below(0)");
        let v = (self.next_f64() * n as f64) as u64;
        v.min(n - 1)
    }

    /// Uniform integer in `[lo, hi]` inclusive.
    fn int_between(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        lo + self.below(hi - lo + 1)
    }
}

/// Production generator, seeded from OS entropy once at construction.
pub struct DefaultRng {
    inner: Pcg64Mcg,
}

impl DefaultRng {
    pub fn new() -> Self {
        Self {
            inner: Pcg64Mcg::from_entropy(),
        }
    }
}

impl Default for DefaultRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngSource for DefaultRng {
    fn next_f64(&mut self) -> f64 {
        bits_to_f64(self.inner.next_u64())
    }
}

/// Deterministic generator for tests and replay tooling.
pub struct SeededRng {
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }
}

impl RngSource for SeededRng {
    fn next_f64(&mut self) -> f64 {
        bits_to_f64(self.inner.next_u64())
    }
}

/// Map the top 53 bits of a u64 onto [0, 1).
fn bits_to_f64(bits: u64) -> f64 {
    (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

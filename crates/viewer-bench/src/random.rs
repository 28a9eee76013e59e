//! Random sources for payload synthesis.
//!
//! The synthesizer never reaches for a global RNG; it is handed a
//! [`RandSource`] instead. Production runs use [`ThreadRandom`] (unseeded,
//! so every run differs), `--seed` selects [`SeededRandom`], and tests can
//! plug in a scripted source.

use rand::{Rng, SeedableRng, rngs::StdRng};

/// A source of uniform random draws.
///
/// # Example
/// ```
/// use viewer_bench::random::RandSource;
///
/// struct Midpoint;
/// impl RandSource for Midpoint {
///     fn uniform_f32(&mut self, low: f32, high: f32) -> f32 {
///         (low + high) / 2.0
///     }
///     fn below(&mut self, _bound: usize) -> usize {
///         0
///     }
/// }
///
/// assert_eq!(Midpoint.uniform_f32(0.0, 10.0), 5.0);
/// ```
pub trait RandSource {
    /// Returns a float drawn uniformly from `[low, high)`.
    fn uniform_f32(&mut self, low: f32, high: f32) -> f32;

    /// Returns an integer drawn uniformly from `[0, bound)`.
    fn below(&mut self, bound: usize) -> usize;
}

/// A `RandSource` backed by the thread-local RNG (`rand::rng()`).
///
/// Zero-sized: it does not store the RNG, so it is `Send` even though the
/// underlying `ThreadRng` is not.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn uniform_f32(&mut self, low: f32, high: f32) -> f32 {
        rand::rng().random_range(low..high)
    }

    fn below(&mut self, bound: usize) -> usize {
        rand::rng().random_range(0..bound)
    }
}

/// A deterministic `RandSource` for reproducible runs.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandSource for SeededRandom {
    fn uniform_f32(&mut self, low: f32, high: f32) -> f32 {
        self.rng.random_range(low..high)
    }

    fn below(&mut self, bound: usize) -> usize {
        self.rng.random_range(0..bound)
    }
}

/// The source picked at startup.
#[derive(Clone, Debug)]
pub enum Random {
    Thread(ThreadRandom),
    Seeded(SeededRandom),
}

impl Random {
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::Seeded(SeededRandom::new(seed)),
            None => Self::Thread(ThreadRandom),
        }
    }
}

impl RandSource for Random {
    fn uniform_f32(&mut self, low: f32, high: f32) -> f32 {
        match self {
            Self::Thread(r) => r.uniform_f32(low, high),
            Self::Seeded(r) => r.uniform_f32(low, high),
        }
    }

    fn below(&mut self, bound: usize) -> usize {
        match self {
            Self::Thread(r) => r.below(bound),
            Self::Seeded(r) => r.below(bound),
        }
    }
}

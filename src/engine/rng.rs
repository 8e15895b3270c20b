//! Deterministic sequence generator for seed evaluation.

/// LCG multiplier (Numerical Recipes).
const LCG_A: u32 = 1_664_525;

/// LCG increment (Numerical Recipes).
const LCG_C: u32 = 1_013_904_223;

/// Linear congruential generator over 32-bit state.
///
/// State advances as `state = state * A + C (mod 2^32)`; each draw maps the
/// new state to `[0, 1)` as `state / 2^32`. Two generators built from the
/// same seed produce identical infinite sequences, which is what makes a
/// scan reproducible and resumable. This is an approximation of the game's
/// sequence, not a faithful reproduction.
#[derive(Debug, Clone)]
pub struct LcgRng {
    state: u32,
}

impl LcgRng {
    /// Create a generator from a seed.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advance the state and return a draw in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(LCG_A).wrapping_add(LCG_C);
        self.state as f64 / 4_294_967_296.0
    }
}

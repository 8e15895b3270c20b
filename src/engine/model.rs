//! Survival predicate evaluation.

use crate::schema::{KillRule, Model};

use super::LcgRng;

/// Per-seed evaluation failure.
///
/// The built-in [`CheckModel`] never fails, but replacement predicates may;
/// a worker treats a failed seed as a non-winner and keeps scanning.
#[derive(Debug, thiserror::Error)]
#[error("Seed {seed} evaluation failed: {message}")]
pub struct EvalError {
    pub seed: u32,
    pub message: String,
}

/// The replaceable survival predicate.
///
/// Implementations must be deterministic in the seed: the same seed must
/// yield the same verdict on every call.
pub trait SurvivalModel: Sync {
    /// Did this seed survive every check?
    fn evaluate(&self, seed: u32) -> Result<bool, EvalError>;
}

/// Default predicate: `num_checks` independent draws against the kill
/// probability, short-circuiting on the first kill.
///
/// A fresh generator is built from the seed on every evaluation, so no state
/// leaks between seeds. Runtime is data-dependent: a survivor costs the full
/// `num_checks` draws, a seed that dies on its first check costs one.
#[derive(Debug, Clone)]
pub struct CheckModel {
    model: Model,
}

impl CheckModel {
    /// Build from a validated model, clamping heuristic-derived values.
    pub fn new(model: Model) -> Self {
        Self {
            model: model.clamped(),
        }
    }

    /// The model parameters in effect.
    pub fn model(&self) -> &Model {
        &self.model
    }
}

impl SurvivalModel for CheckModel {
    fn evaluate(&self, seed: u32) -> Result<bool, EvalError> {
        let mut rng = LcgRng::new(seed);
        let p = self.model.kill_probability;

        for _ in 0..self.model.num_checks {
            let draw = rng.next_f64();
            let killed = match self.model.kill_rule {
                KillRule::Below => draw < p,
                KillRule::AtOrBelow => draw <= p,
            };
            if killed {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

//! Model derivation heuristic for decoded level text.
//!
//! The check count is approximated by counting entity separators in the
//! decoded level payload. This is an approximation of the real level format,
//! not a faithful decoder; callers that know the true check count should
//! construct a [`Model`] directly instead.

use super::{MAX_LEVEL_TEXT_BYTES, Model};

/// Separator character between entity entries in decoded level text.
const ENTITY_SEPARATOR: char = ';';

/// Kill probability assumed when deriving a model from level text.
const HEURISTIC_KILL_PROBABILITY: f64 = 0.5;

/// Derive a survival model from decoded level text.
///
/// Counts entity separators to estimate the number of checks, assumes the
/// community's 50% kill probability, and clamps the result into valid
/// bounds. Input longer than [`MAX_LEVEL_TEXT_BYTES`] is truncated before
/// counting.
pub fn model_from_level_text(text: &str) -> Model {
    let mut end = text.len().min(MAX_LEVEL_TEXT_BYTES);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let text = &text[..end];

    let num_checks = text.chars().filter(|&c| c == ENTITY_SEPARATOR).count();

    Model {
        num_checks: num_checks.min(u32::MAX as usize) as u32,
        kill_probability: HEURISTIC_KILL_PROBABILITY,
        ..Model::default()
    }
    .clamped()
}

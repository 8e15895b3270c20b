//! Configuration types for seed scans.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Hard cap on seeds tested in one invocation.
pub const MAX_SCAN_COUNT: u32 = 10_000_000;

/// Hard cap on checks per seed.
pub const MAX_CHECKS: u32 = 10_000;

/// Hard cap on concurrent scan workers.
pub const MAX_WORKERS: u32 = 64;

/// Hard cap on raw level text fed to the model heuristic.
pub const MAX_LEVEL_TEXT_BYTES: usize = 1 << 20;

/// Default stride for backward compatibility (dense scans).
fn default_stride() -> u32 {
    1
}

fn default_output() -> PathBuf {
    PathBuf::from("winners.txt")
}

/// Which draws count as a kill.
///
/// The comparison direction against the community's stated kill semantics is
/// a convention, not a verified fact, so it is kept configurable rather than
/// baked in. `Below` (`draw < p` kills) is the default convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillRule {
    /// A draw strictly below the kill probability ends the run.
    #[default]
    Below,
    /// A draw at or below the kill probability ends the run.
    AtOrBelow,
}

/// Survival model: how many checks a seed faces and how deadly each one is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Number of independent survival checks per seed.
    pub num_checks: u32,
    /// Probability that a single check kills the run.
    pub kill_probability: f64,
    /// Kill comparison convention.
    #[serde(default)]
    pub kill_rule: KillRule,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            num_checks: 35,
            kill_probability: 0.5,
            kill_rule: KillRule::Below,
        }
    }
}

impl Model {
    /// Clamp heuristic-derived values into their valid ranges.
    ///
    /// The kill probability may originate from an imprecise decoder, so
    /// out-of-range values are pulled back into [0, 1] instead of rejected.
    /// `num_checks` above the safety cap is clamped to the cap.
    pub fn clamped(mut self) -> Self {
        self.kill_probability = if self.kill_probability.is_finite() {
            self.kill_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.num_checks = self.num_checks.min(MAX_CHECKS);
        self
    }

    /// Validate structural bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_checks > MAX_CHECKS {
            return Err(ConfigError::TooManyChecks {
                checks: self.num_checks,
                max: MAX_CHECKS,
            });
        }
        if !self.kill_probability.is_finite()
            || self.kill_probability < 0.0
            || self.kill_probability > 1.0
        {
            return Err(ConfigError::InvalidKillProbability {
                p: self.kill_probability,
            });
        }
        Ok(())
    }
}

/// The arithmetic sequence of seeds to test:
/// `start_seed + i * stride (mod 2^32)` for `i in [0, count)`.
///
/// Wraparound past `u32::MAX` is intentional, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// First seed of the sequence.
    pub start_seed: u32,
    /// Number of seeds to test.
    pub count: u32,
    /// Step between consecutive seeds.
    #[serde(default = "default_stride")]
    pub stride: u32,
}

impl ScanRequest {
    /// Seed at index `i`, with modular wraparound.
    #[inline]
    pub fn seed_at(&self, i: u32) -> u32 {
        self.start_seed.wrapping_add(i.wrapping_mul(self.stride))
    }

    /// Validate structural bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stride == 0 {
            return Err(ConfigError::ZeroStride);
        }
        if self.count > MAX_SCAN_COUNT {
            return Err(ConfigError::ScanTooLarge {
                count: self.count,
                max: MAX_SCAN_COUNT,
            });
        }
        Ok(())
    }
}

/// Top-level scan configuration, loaded from JSON by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// First seed of the scan.
    pub start_seed: u32,
    /// Number of seeds to test.
    pub count: u32,
    /// Step between consecutive seeds.
    #[serde(default = "default_stride")]
    pub stride: u32,
    /// Worker count; 0 picks a count from available parallelism.
    #[serde(default)]
    pub worker_budget: u32,
    /// Survival model.
    #[serde(default)]
    pub model: Model,
    /// Output file for winner seeds.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_seed: 0,
            count: 200_000,
            stride: 1,
            worker_budget: 0,
            model: Model::default(),
            output: default_output(),
        }
    }
}

impl ScanConfig {
    /// The scan range portion of the configuration.
    pub fn request(&self) -> ScanRequest {
        ScanRequest {
            start_seed: self.start_seed,
            count: self.count,
            stride: self.stride,
        }
    }

    /// Validate all parameters. Checked once at entry, before any worker
    /// starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.request().validate()?;
        self.model.validate()?;
        if self.worker_budget > MAX_WORKERS {
            return Err(ConfigError::TooManyWorkers {
                workers: self.worker_budget,
                max: MAX_WORKERS,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Stride must be at least 1")]
    ZeroStride,
    #[error("Scan count {count} exceeds safety cap {max}")]
    ScanTooLarge { count: u32, max: u32 },
    #[error("Check count {checks} exceeds safety cap {max}")]
    TooManyChecks { checks: u32, max: u32 },
    #[error("Kill probability {p} is not in [0, 1]")]
    InvalidKillProbability { p: f64 },
    #[error("Worker budget {workers} exceeds safety cap {max}")]
    TooManyWorkers { workers: u32, max: u32 },
}

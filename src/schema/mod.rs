//! Schema module - Configuration types for seed scans.

mod config;
mod heuristic;

pub use config::*;
pub use heuristic::*;

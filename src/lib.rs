//! seed-sieve - Brute-force 32-bit seed search for survival-check models.
//!
//! Scans a range of 32-bit seeds, evaluates each against a deterministic
//! survival predicate (N independent checks against a kill probability,
//! drawn from a per-seed linear congruential sequence), and streams the
//! surviving seeds to a line-oriented output file.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Configuration types, validation, and the level-text model
//!   heuristic
//! - `engine`: The scan core (generator, predicate, partitioner, workers,
//!   engine)
//! - `sink`: Durable winner output
//!
//! # Example
//!
//! ```rust,no_run
//! use seed_sieve::{
//!     engine::ScanEngine,
//!     schema::{Model, ScanConfig},
//!     sink::WinnerSink,
//! };
//!
//! let config = ScanConfig {
//!     start_seed: 0,
//!     count: 200_000,
//!     model: Model::default(),
//!     ..ScanConfig::default()
//! };
//!
//! let engine = ScanEngine::new(&config)?;
//! let mut sink = WinnerSink::create(&config.output)?;
//!
//! let outcome = engine.run_with_callback(&mut sink, |progress| {
//!     println!(
//!         "tested {}/{} seeds, {} winners",
//!         progress.seeds_tested, progress.total_seeds, progress.winners_found
//!     );
//! })?;
//!
//! println!("{} winners in {:.2}s", outcome.winners_found, outcome.elapsed_seconds);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod schema;
pub mod sink;

// Re-export commonly used types
pub use engine::{ScanEngine, ScanError, ScanOutcome, ScanProgress, StopReason};
pub use schema::{Model, ScanConfig, ScanRequest};
pub use sink::WinnerSink;

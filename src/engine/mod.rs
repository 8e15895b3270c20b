//! Engine module - Seed-space scanning core.

mod model;
mod partition;
mod rng;
mod scan;
mod worker;

pub use model::*;
pub use partition::*;
pub use rng::*;
pub use scan::*;
pub use worker::*;

//! HTTP handlers

pub mod health;
pub mod hotspots;
pub mod observations;
pub mod prediction;
pub mod summary;

pub use health::*;
pub use hotspots::*;
pub use observations::*;
pub use prediction::*;
pub use summary::*;

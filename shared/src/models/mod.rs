//! Domain models for the Algae Bloom Risk Platform

mod hotspot;
mod observation;
mod prediction;
mod severity;
mod weather;

pub use hotspot::*;
pub use observation::*;
pub use prediction::*;
pub use severity::*;
pub use weather::*;

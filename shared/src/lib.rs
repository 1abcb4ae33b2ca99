//! Shared types and models for the Algae Bloom Risk Platform
//!
//! This crate contains the domain types and pure computations shared between
//! the backend, the dashboard (via WASM), and the batch pipeline.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;

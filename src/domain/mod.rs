//! Domain layer for the areaflow engine
//!
//! Models, errors, and the ports the engine consumes from the outside world.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};

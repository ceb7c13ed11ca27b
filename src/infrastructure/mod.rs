//! Infrastructure layer module
//!
//! - Configuration management
//! - Logging infrastructure
//! - Credentials
//!
//! Implementations here satisfy the port traits defined in the domain layer.

pub mod config;
pub mod credentials;
pub mod logging;

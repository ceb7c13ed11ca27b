//! CLI command implementations.

pub mod binding;
pub mod catalog;
pub mod run;

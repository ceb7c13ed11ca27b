//! In-process adapters for tests and embedders.

pub mod binding_repository;

pub use binding_repository::InMemoryBindingRepository;

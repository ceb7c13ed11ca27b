//! Areaflow - action/reaction automation engine
//!
//! Users bind a trigger ("action") on one service to an effect
//! ("reaction") on another. The engine polls every active binding on a
//! fixed tick, runs the action's check, persists the handler-owned state
//! it returns, and fires the reaction when the check reports a trigger.
//!
//! # Architecture
//!
//! - **Domain** (`domain`): models, errors and the ports the engine consumes
//! - **Services** (`services`): registry, in-flight guard, evaluator, scheduler, binding service
//! - **Handlers** (`handlers`): built-in actions and reactions
//! - **Adapters** (`adapters`): SQLite and in-memory binding storage
//! - **Infrastructure** (`infrastructure`): configuration, logging, credentials
//! - **CLI** (`cli`): the `areaflow` command
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use areaflow::{BindingScheduler, Evaluator, HandlerRegistry, InMemoryBindingRepository};
//!
//! let repo = Arc::new(InMemoryBindingRepository::new());
//! let evaluator = Arc::new(Evaluator::new(Arc::new(HandlerRegistry::new()), repo.clone()));
//! let scheduler = BindingScheduler::new(repo, evaluator, Default::default());
//! scheduler.tick().await;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod handlers;
pub mod infrastructure;
pub mod services;

pub use adapters::memory::InMemoryBindingRepository;
pub use adapters::sqlite::SqliteBindingRepository;
pub use domain::models::{
    ActionInstance, Binding, Config, DeliveryMode, EngineConfig, HandlerKey, NewBinding,
    ParameterField, ParameterSchema, ReactionInstance,
};
pub use domain::ports::{
    ActionHandler, BindingRepository, CheckOutcome, Clock, CredentialProvider, HandlerContext,
    HandlerError, ReactionHandler,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    BindingScheduler, BindingService, EvaluationOutcome, Evaluator, HandlerRegistry, InFlightGuard,
};

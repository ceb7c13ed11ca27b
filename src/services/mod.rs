//! Engine services.

pub mod binding_service;
pub mod evaluator;
pub mod handler_registry;
pub mod inflight_guard;
pub mod scheduler;

pub use binding_service::BindingService;
pub use evaluator::{EvaluationOutcome, Evaluator};
pub use handler_registry::{CatalogEntry, HandlerInfo, HandlerRegistry};
pub use inflight_guard::{InFlightGuard, InFlightLease};
pub use scheduler::{BindingScheduler, SchedulerStats, SchedulerStatsSnapshot, TickReport};

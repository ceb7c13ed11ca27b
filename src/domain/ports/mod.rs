//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the engine consumes:
//! - ActionHandler / ReactionHandler: the handler contract
//! - BindingRepository: binding persistence
//! - CredentialProvider: per-user upstream tokens
//! - Clock: wall-clock time for handlers
//!
//! Adapters implement these traits so the engine stays independent of any
//! concrete database, token service, or upstream API.

pub mod binding_repository;
pub mod clock;
pub mod credentials;
pub mod handler;

pub use binding_repository::BindingRepository;
pub use clock::{Clock, SystemClock};
pub use credentials::CredentialProvider;
pub use handler::{
    optional_str, required_str, ActionHandler, CheckOutcome, HandlerContext, HandlerError,
    ReactionHandler,
};

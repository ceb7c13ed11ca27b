pub mod binding;
pub mod config;
pub mod parameter;

pub use binding::{ActionInstance, Binding, HandlerKey, NewBinding, ReactionInstance};
pub use config::{
    Config, CredentialEntry, DatabaseConfig, DeliveryMode, EngineConfig, HttpConfig, LoggingConfig,
};
pub use parameter::{ParameterError, ParameterField, ParameterSchema, ParameterType};

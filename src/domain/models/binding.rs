//! Binding domain model.
//!
//! A binding ("area") pairs exactly one action instance with exactly one
//! reaction instance on behalf of a user. The engine polls the action and
//! fires the reaction when the action reports a trigger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Canonical identity of a handler: `"{service}.{type}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HandlerKey {
    service: String,
    kind: String,
}

impl HandlerKey {
    pub fn new(service: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            kind: kind.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The handler type within its service (`type` in the catalog).
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.kind)
    }
}

impl FromStr for HandlerKey {
    type Err = String;

    /// Splits on the first `.`; both halves must be non-empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((service, kind)) if !service.is_empty() && !kind.is_empty() => {
                Ok(Self::new(service, kind))
            }
            _ => Err(format!(
                "Invalid handler key '{s}': expected '<service>.<type>'"
            )),
        }
    }
}

impl TryFrom<String> for HandlerKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HandlerKey> for String {
    fn from(key: HandlerKey) -> Self {
        key.to_string()
    }
}

/// The trigger half of a binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInstance {
    pub service: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parameters: Value,
    /// Opaque, handler-owned state. `None` until the first evaluation
    /// returns a new state.
    pub current_state: Option<Value>,
    /// Bumped whenever the parameters change. A state write made against an
    /// older revision is rejected.
    #[serde(default)]
    pub revision: i64,
}

impl ActionInstance {
    pub fn new(key: &HandlerKey, parameters: Value) -> Self {
        Self {
            service: key.service().to_string(),
            kind: key.kind().to_string(),
            parameters,
            current_state: None,
            revision: 0,
        }
    }

    pub fn key(&self) -> HandlerKey {
        HandlerKey::new(&self.service, &self.kind)
    }
}

/// The effect half of a binding. Reactions carry no persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionInstance {
    pub service: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parameters: Value,
}

impl ReactionInstance {
    pub fn new(key: &HandlerKey, parameters: Value) -> Self {
        Self {
            service: key.service().to_string(),
            kind: key.kind().to_string(),
            parameters,
        }
    }

    pub fn key(&self) -> HandlerKey {
        HandlerKey::new(&self.service, &self.kind)
    }
}

/// A saved action → reaction pairing owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub user_id: Uuid,
    pub action: ActionInstance,
    pub reaction: ReactionInstance,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Binding {
    /// Create a new, active binding with empty action state.
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        action: ActionInstance,
        reaction: ReactionInstance,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_active: true,
            user_id,
            action,
            reaction,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to create a binding, before validation.
#[derive(Debug, Clone)]
pub struct NewBinding {
    pub user_id: Uuid,
    pub name: String,
    pub action: HandlerKey,
    pub action_parameters: Value,
    pub reaction: HandlerKey,
    pub reaction_parameters: Value,
}

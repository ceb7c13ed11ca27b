//! Binding CLI commands.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::cli::output::{output, truncate, CommandOutput, MessageOutput};
use crate::cli::AppContext;
use crate::domain::models::{Binding, HandlerKey, NewBinding, ParameterSchema};
use crate::domain::ports::BindingRepository;
use crate::services::{BindingScheduler, BindingService, EvaluationOutcome, Evaluator};

#[derive(Args, Debug)]
pub struct BindingArgs {
    #[command(subcommand)]
    pub command: BindingCommands,
}

#[derive(Subcommand, Debug)]
pub enum BindingCommands {
    /// Create a binding from an action and a reaction
    Create {
        /// Owner of the binding
        #[arg(long)]
        user: Uuid,
        /// Display name
        #[arg(long)]
        name: String,
        /// Action key, e.g. timer.cron
        #[arg(long)]
        action: HandlerKey,
        /// Action parameter as key=value (repeatable)
        #[arg(long = "action-param", value_parser = parse_key_val)]
        action_params: Vec<(String, String)>,
        /// Reaction key, e.g. webhook.post
        #[arg(long)]
        reaction: HandlerKey,
        /// Reaction parameter as key=value (repeatable)
        #[arg(long = "reaction-param", value_parser = parse_key_val)]
        reaction_params: Vec<(String, String)>,
    },
    /// List bindings
    List {
        /// Only show bindings owned by this user
        #[arg(long)]
        user: Option<Uuid>,
    },
    /// Show binding details, including action state
    Show { id: Uuid },
    /// Enable a binding
    Enable { id: Uuid },
    /// Disable a binding
    Disable { id: Uuid },
    /// Rename a binding
    Rename { id: Uuid, name: String },
    /// Replace a binding's parameters (resets its action state)
    Update {
        id: Uuid,
        /// Action parameter as key=value (repeatable)
        #[arg(long = "action-param", value_parser = parse_key_val)]
        action_params: Vec<(String, String)>,
        /// Reaction parameter as key=value (repeatable)
        #[arg(long = "reaction-param", value_parser = parse_key_val)]
        reaction_params: Vec<(String, String)>,
    },
    /// Delete a binding
    Delete { id: Uuid },
    /// Evaluate a binding once, right now
    ///
    /// This runs in its own process with its own in-flight tracking. It does
    /// not coordinate with `areaflow run`: if the engine is polling the same
    /// database, both may evaluate the binding at once and deliver the
    /// reaction twice. Stop the engine (or disable the binding in it) first.
    Evaluate { id: Uuid },
}

/// Parse a `key=value` pair; the value may itself contain `=`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BindingOutput {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub user_id: String,
    pub action: String,
    pub reaction: String,
    pub action_parameters: Value,
    pub reaction_parameters: Value,
    pub current_state: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Binding> for BindingOutput {
    fn from(b: &Binding) -> Self {
        Self {
            id: b.id.to_string(),
            name: b.name.clone(),
            active: b.is_active,
            user_id: b.user_id.to_string(),
            action: b.action.key().to_string(),
            reaction: b.reaction.key().to_string(),
            action_parameters: b.action.parameters.clone(),
            reaction_parameters: b.reaction.parameters.clone(),
            current_state: b.action.current_state.clone(),
            created_at: b.created_at.to_rfc3339(),
            updated_at: b.updated_at.to_rfc3339(),
        }
    }
}

impl CommandOutput for BindingOutput {
    fn to_human(&self) -> String {
        let state = self
            .current_state
            .as_ref()
            .map_or_else(|| "(none)".to_string(), ToString::to_string);
        [
            format!("Binding: {}", self.name),
            format!("ID: {}", self.id),
            format!("User: {}", self.user_id),
            format!("Active: {}", self.active),
            format!("Action: {} {}", self.action, self.action_parameters),
            format!("Reaction: {} {}", self.reaction, self.reaction_parameters),
            format!("State: {state}"),
            format!("Created: {}", self.created_at),
            format!("Updated: {}", self.updated_at),
        ]
        .join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BindingListOutput {
    pub bindings: Vec<BindingOutput>,
    pub total: usize,
}

impl CommandOutput for BindingListOutput {
    fn to_human(&self) -> String {
        if self.bindings.is_empty() {
            return "No bindings found.".to_string();
        }

        let mut lines = vec![format!("Found {} binding(s):\n", self.total)];
        lines.push(format!(
            "{:<10} {:<24} {:<7} {:<26} {:<26}",
            "ID", "NAME", "ACTIVE", "ACTION", "REACTION"
        ));
        lines.push("-".repeat(96));
        for b in &self.bindings {
            lines.push(format!(
                "{:<10} {:<24} {:<7} {:<26} {:<26}",
                &b.id[..8],
                truncate(&b.name, 22),
                if b.active { "yes" } else { "no" },
                truncate(&b.action, 24),
                truncate(&b.reaction, 24),
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EvaluateOutput {
    pub binding_id: String,
    pub outcome: String,
    pub detail: Option<String>,
}

impl EvaluateOutput {
    fn new(id: Uuid, outcome: &EvaluationOutcome) -> Self {
        let detail = match outcome {
            EvaluationOutcome::CheckFailed(e) | EvaluationOutcome::ExecuteFailed(e) => Some(e.to_string()),
            EvaluationOutcome::StatePersistFailed(e) => Some(e.to_string()),
            _ => None,
        };
        Self {
            binding_id: id.to_string(),
            outcome: outcome.label().to_string(),
            detail,
        }
    }
}

impl CommandOutput for EvaluateOutput {
    fn to_human(&self) -> String {
        match &self.detail {
            Some(detail) => format!("Binding {}: {} ({detail})", self.binding_id, self.outcome),
            None => format!("Binding {}: {}", self.binding_id, self.outcome),
        }
    }
}

fn capture(schema: Option<&ParameterSchema>, raw: &[(String, String)], side: &str) -> Result<Value> {
    let fallback = ParameterSchema::default();
    schema
        .unwrap_or(&fallback)
        .capture(raw)
        .with_context(|| format!("Invalid {side} parameters"))
}

pub async fn execute(args: BindingArgs, ctx: AppContext, json_mode: bool) -> Result<()> {
    let service = BindingService::new(Arc::clone(&ctx.repository), Arc::clone(&ctx.registry));

    match args.command {
        BindingCommands::Create {
            user,
            name,
            action,
            action_params,
            reaction,
            reaction_params,
        } => {
            let action_parameters = capture(ctx.registry.action_schema(&action), &action_params, "action")?;
            let reaction_parameters =
                capture(ctx.registry.reaction_schema(&reaction), &reaction_params, "reaction")?;

            let binding = service
                .create(NewBinding {
                    user_id: user,
                    name,
                    action,
                    action_parameters,
                    reaction,
                    reaction_parameters,
                })
                .await
                .context("Failed to create binding")?;
            output(&BindingOutput::from(&binding), json_mode);
        }
        BindingCommands::List { user } => {
            let bindings = service.list(user).await.context("Failed to list bindings")?;
            let bindings: Vec<BindingOutput> = bindings.iter().map(BindingOutput::from).collect();
            let total = bindings.len();
            output(&BindingListOutput { bindings, total }, json_mode);
        }
        BindingCommands::Show { id } => {
            let Some(binding) = service.get(id).await.context("Failed to load binding")? else {
                bail!("Binding not found: {id}");
            };
            output(&BindingOutput::from(&binding), json_mode);
        }
        BindingCommands::Enable { id } => {
            service.enable(id).await.context("Failed to enable binding")?;
            output(&MessageOutput::ok(format!("Binding {id} enabled")), json_mode);
        }
        BindingCommands::Disable { id } => {
            service.disable(id).await.context("Failed to disable binding")?;
            output(&MessageOutput::ok(format!("Binding {id} disabled")), json_mode);
        }
        BindingCommands::Rename { id, name } => {
            service.rename(id, &name).await.context("Failed to rename binding")?;
            output(&MessageOutput::ok(format!("Binding {id} renamed to '{}'", name.trim())), json_mode);
        }
        BindingCommands::Update {
            id,
            action_params,
            reaction_params,
        } => {
            let Some(binding) = service.get(id).await.context("Failed to load binding")? else {
                bail!("Binding not found: {id}");
            };
            let action_parameters =
                capture(ctx.registry.action_schema(&binding.action.key()), &action_params, "action")?;
            let reaction_parameters = capture(
                ctx.registry.reaction_schema(&binding.reaction.key()),
                &reaction_params,
                "reaction",
            )?;
            service
                .update_parameters(id, action_parameters, reaction_parameters)
                .await
                .context("Failed to update binding")?;
            output(&MessageOutput::ok(format!("Binding {id} updated; action state reset")), json_mode);
        }
        BindingCommands::Delete { id } => {
            service.delete(id).await.context("Failed to delete binding")?;
            output(&MessageOutput::ok(format!("Binding {id} deleted")), json_mode);
        }
        BindingCommands::Evaluate { id } => {
            warn!(
                binding_id = %id,
                "Evaluating outside the engine; not coordinated with a running `areaflow run`"
            );
            let repository: Arc<dyn BindingRepository> = ctx.repository.clone();
            let evaluator = Arc::new(Evaluator::from_config(
                Arc::clone(&ctx.registry),
                Arc::clone(&repository),
                &ctx.config.engine,
            ));
            let scheduler = BindingScheduler::new(repository, evaluator, ctx.config.engine.clone());

            match scheduler.evaluate_once(id).await.context("Failed to evaluate binding")? {
                Some(outcome) => output(&EvaluateOutput::new(id, &outcome), json_mode),
                None => bail!("Binding {id} is already being evaluated"),
            }
        }
    }

    Ok(())
}

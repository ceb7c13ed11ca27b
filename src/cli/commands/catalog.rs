//! Catalog CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::ParameterSchema;
use crate::services::{CatalogEntry, HandlerRegistry};

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// List available actions (triggers)
    Actions,
    /// List available reactions (effects)
    Reactions,
}

#[derive(Debug, serde::Serialize)]
pub struct CatalogOutput {
    pub kind: &'static str,
    pub entries: Vec<CatalogEntry>,
}

fn describe_parameters(schema: &ParameterSchema) -> String {
    match schema {
        ParameterSchema::Opaque(text) => text.clone(),
        ParameterSchema::Fields(fields) if fields.is_empty() => "-".to_string(),
        ParameterSchema::Fields(fields) => fields
            .iter()
            .map(|(name, field)| {
                if field.optional {
                    format!("[{name}: {}]", field.kind)
                } else {
                    format!("{name}: {}", field.kind)
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

impl CommandOutput for CatalogOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return format!("No {} registered.", self.kind);
        }

        let mut lines = vec![format!("{} available {}:\n", self.entries.len(), self.kind)];
        lines.push(format!("{:<28} {:<40} {}", "KEY", "DESCRIPTION", "PARAMETERS"));
        lines.push("-".repeat(100));
        for entry in &self.entries {
            lines.push(format!(
                "{:<28} {:<40} {}",
                entry.key().to_string(),
                truncate(&entry.description, 38),
                describe_parameters(&entry.parameters),
            ));
        }
        lines.join("\n")
    }
}

pub fn execute(args: CatalogArgs, registry: &HandlerRegistry, json_mode: bool) -> Result<()> {
    let out = match args.command {
        CatalogCommands::Actions => CatalogOutput {
            kind: "actions",
            entries: registry.list_actions(),
        },
        CatalogCommands::Reactions => CatalogOutput {
            kind: "reactions",
            entries: registry.list_reactions(),
        },
    };
    output(&out, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ParameterField;

    #[test]
    fn test_describe_parameters() {
        let schema = ParameterSchema::fields([
            ("url", ParameterField::string("u")),
            ("body", ParameterField::string("b").optional()),
        ]);
        assert_eq!(describe_parameters(&schema), "[body: string], url: string");
        assert_eq!(describe_parameters(&ParameterSchema::default()), "-");
        assert_eq!(describe_parameters(&ParameterSchema::opaque("free text")), "free text");
    }
}

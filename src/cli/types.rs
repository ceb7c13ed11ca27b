//! CLI type definitions
//!
//! Top-level clap structures. Subcommand arguments live next to their
//! implementations in `commands/`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::binding::BindingArgs;
use crate::cli::commands::catalog::CatalogArgs;
use crate::cli::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "areaflow")]
#[command(about = "Areaflow - action/reaction automation engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .areaflow/
    #[arg(short, long, global = true, env = "AREAFLOW_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the binding scheduler until interrupted
    Run(RunArgs),

    /// List available actions and reactions
    Catalog(CatalogArgs),

    /// Manage bindings
    Binding(BindingArgs),
}

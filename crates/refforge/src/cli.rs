use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "refforge", about = "Reconcile game reference data into an ID-keyed database")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    /// Path to refforge.yaml; defaults to ./refforge.yaml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub sources: Option<PathBuf>,
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the database and indexes, skipping when nothing changed.
    Build {
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Version string recorded in version.json.
        #[arg(long)]
        stamp: Option<String>,
    },
    /// Print counts of the current database.
    Info,
    /// Run ingestion and validation only; writes nothing.
    Validate,
}

mod cli;
mod config;
mod logging;
mod run;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::RunConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    let cfg = RunConfig::load(cli.config.as_deref())?.with_cli(cli.sources, cli.output);
    match cli.command {
        Command::Build { force, stamp } => run::build(cfg, force, stamp),
        Command::Info => run::info(&cfg),
        Command::Validate => run::validate_only(&cfg),
    }
}

mod cli;
mod config;
mod logging;
mod manifest;
mod run;
mod session;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    match cli.command {
        Command::Lookup { slug, config } => run::lookup(slug, config),
        Command::Watch { config } => run::watch(config),
        Command::Tabs { config } => run::tabs(config),
        Command::Peek { manifest: url } => manifest::peek(url),
    }
}

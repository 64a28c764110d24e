use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "slugscan", about = "membership tier lookup against published sheet tabs")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// One-shot lookup: fetch the tabs, build the index, report the tiers.
    Lookup {
        slug: String,
        #[arg(long, default_value = "slugscan.yaml")]
        config: String,
    },
    /// Read queries from stdin, one lookup session, reusing the fetch cache.
    Watch {
        #[arg(long, default_value = "slugscan.yaml")]
        config: String,
    },
    /// List the configured tiers and the sheet tab backing each.
    Tabs {
        #[arg(long, default_value = "slugscan.yaml")]
        config: String,
    },
    /// Print one random entry from an image manifest.
    Peek {
        #[arg(long)]
        manifest: String,
    },
}

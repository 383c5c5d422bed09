use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

#[derive(Parser, Debug)]
#[command(
    name = "crosstown",
    about = "Bridges Nostr social identity to Interledger payment peering",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap peering from the configured social graph, then keep the
    /// relay monitor running and stream lifecycle events to stdout.
    Start {
        /// Path to the node config file (overrides auto-discovery).
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Run bootstrap once, print the `PeeringResult` list as JSON, and exit
    /// without starting the long-lived relay monitor.
    Bootstrap {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration (merged from all discovered config
    /// layers plus `--config`) and exit.
    ShowConfig {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "crosstown", &mut std::io::stdout());
}

//! CLI argument definitions.

use clap::Parser;

use qbank_client::API_URL_ENV;

use crate::commands::Command;

/// Command-line client for the qbank quiz API.
#[derive(Parser, Debug)]
#[command(name = "qbank")]
#[command(author, version = env!("QBANK_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// API base URL [default: http://localhost:5000/api/v1]
    #[arg(long, global = true, env = API_URL_ENV)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

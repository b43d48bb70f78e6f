//! Whoami command implementation.

use anyhow::{Context, Result};
use clap::Args;

use qbank_client::AuthenticatedClient;

use super::NOT_LOGGED_IN;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the identity as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: WhoamiArgs, client: &AuthenticatedClient) -> Result<()> {
    let user = client
        .current_user()
        .await
        .context("Failed to fetch current user")?
        .context(NOT_LOGGED_IN)?;

    if args.json {
        output::json_pretty(&user)?;
    } else {
        output::identity(&user);
    }

    Ok(())
}

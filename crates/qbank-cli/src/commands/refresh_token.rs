//! Refresh token command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use qbank_client::AuthenticatedClient;

use super::NOT_LOGGED_IN;
use crate::output;

#[derive(Args, Debug)]
pub struct RefreshTokenArgs {}

pub async fn run(_args: RefreshTokenArgs, client: &AuthenticatedClient) -> Result<()> {
    let Some(user) = client.session().identity() else {
        bail!(NOT_LOGGED_IN);
    };

    eprintln!("{}", "Refreshing session...".dimmed());

    client
        .refresh()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    output::field("Username", &user.username);

    Ok(())
}

//! Logout command implementation.

use anyhow::Result;
use clap::Args;

use qbank_client::AuthenticatedClient;

use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(_args: LogoutArgs, client: &AuthenticatedClient) -> Result<()> {
    if !client.session().is_authenticated() {
        output::success("Not logged in");
        return Ok(());
    }

    client.logout().await;
    output::success("Logged out");

    Ok(())
}

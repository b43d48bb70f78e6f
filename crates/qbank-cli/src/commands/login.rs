//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use qbank_client::AuthenticatedClient;
use qbank_core::LoginForm;

use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account username
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long, env = "QBANK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: LoginArgs, client: &AuthenticatedClient) -> Result<()> {
    let form = LoginForm::new(&args.username, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    let user = client.login(&form).await.context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    output::identity(&user);

    Ok(())
}

//! Register command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use qbank_client::AuthenticatedClient;
use qbank_core::RegisterForm;

use crate::output;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Username for the new account
    #[arg(long)]
    pub username: String,

    /// Email address for the new account
    #[arg(long)]
    pub email: String,

    /// Password for the new account
    #[arg(long, env = "QBANK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: RegisterArgs, client: &AuthenticatedClient) -> Result<()> {
    let form = RegisterForm::new(&args.username, &args.email, &args.password);

    eprintln!("{}", "Creating account...".dimmed());

    let user = client
        .register(&form)
        .await
        .context("Failed to create account")?;

    output::success("Account created");
    println!();
    output::identity(&user);

    Ok(())
}

//! Subcommand implementations.

mod login;
mod logout;
mod refresh_token;
mod register;
mod request;
mod whoami;

use anyhow::Result;
use clap::Subcommand;

use qbank_client::AuthenticatedClient;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in with username and password
    Login(login::LoginArgs),

    /// Create a new account and log into it
    Register(register::RegisterArgs),

    /// End the active session
    Logout(logout::LogoutArgs),

    /// Display the logged-in user
    Whoami(whoami::WhoamiArgs),

    /// Exchange the refresh token for a new access token
    RefreshToken(refresh_token::RefreshTokenArgs),

    /// Send an API request with the session's credentials
    Request(request::RequestArgs),
}

pub async fn handle(cmd: Command, client: &AuthenticatedClient) -> Result<()> {
    match cmd {
        Command::Login(args) => login::run(args, client).await,
        Command::Register(args) => register::run(args, client).await,
        Command::Logout(args) => logout::run(args, client).await,
        Command::Whoami(args) => whoami::run(args, client).await,
        Command::RefreshToken(args) => refresh_token::run(args, client).await,
        Command::Request(args) => request::run(args, client).await,
    }
}

pub(crate) const NOT_LOGGED_IN: &str = "No active session. Run 'qbank login' first.";

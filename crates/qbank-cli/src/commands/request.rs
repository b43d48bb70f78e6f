//! Raw request command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use qbank_client::AuthenticatedClient;
use qbank_core::{Method, RequestSpec};

use crate::output;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API base URL (e.g. /banks)
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Send without credentials
    #[arg(long)]
    pub no_auth: bool,
}

pub async fn run(args: RequestArgs, client: &AuthenticatedClient) -> Result<()> {
    let method: Method = args.method.parse().context("Invalid HTTP method")?;
    let mut spec = RequestSpec::new(method, &args.path);

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Query parameter '{}' must be KEY=VALUE", pair))?;
        spec = spec.query(key, value);
    }

    if let Some(data) = &args.data {
        let body = serde_json::from_str(data).context("--data must be valid JSON")?;
        spec = spec.json(body);
    }

    if args.no_auth {
        spec = spec.skip_auth();
    }

    let response = client.send(spec).await.context("Request failed")?;

    let status = format!("HTTP {}", response.status);
    if response.is_success() {
        eprintln!("{}", status.green());
    } else {
        eprintln!("{}", status.red());
    }

    match response.json::<serde_json::Value>() {
        Ok(body) => output::json_pretty(&body)?,
        Err(_) if response.body.is_empty() => {}
        Err(_) => println!("{}", response.text()),
    }

    if !response.is_success() {
        bail!("Server answered HTTP {}", response.status);
    }

    Ok(())
}

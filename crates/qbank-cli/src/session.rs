//! Session storage for persisting login state between invocations.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::debug;

use qbank_client::{AuthenticatedClient, ClientConfig, FileStore, SessionState};
use qbank_core::ApiUrl;

/// Environment variable overriding the session data directory.
pub const DATA_DIR_ENV: &str = "QBANK_DATA_DIR";

/// Get the session file path.
fn session_path() -> Result<PathBuf> {
    let data_dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => ProjectDirs::from("", "", "qbank")
            .context("Could not determine data directory")?
            .data_dir()
            .to_path_buf(),
    };

    fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("session.json"))
}

/// Build a client whose session is restored from, and written through to,
/// the session file.
pub fn open_client(api_url: Option<&str>) -> Result<AuthenticatedClient> {
    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(url) = api_url {
        config.api_url = ApiUrl::new(url).context("Invalid API URL")?;
    }

    let path = session_path()?;
    debug!(api = %config.api_url, path = %path.display(), "Opening session");

    let store = Arc::new(FileStore::new(path));
    let session = Arc::new(SessionState::restore(store));

    AuthenticatedClient::from_config(&config, session).context("Failed to create HTTP client")
}

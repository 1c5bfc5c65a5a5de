//! Configuration from the environment
//!
//! Empty variables are treated as if they are not set.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;

use crate::query::DisplayPolicy;
use crate::utils::env_var;
use crate::utils::env_var_or_else;

const DEFAULT_ADDRESS: &str = "0.0.0.0:6000";

/// Where the data lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageConfig {
    /// Local storage without file, gone on shutdown
    Memory,

    /// Local storage, the whole blob is rewritten to this file on every change
    File(PathBuf),

    /// Remote storage in Postgres, with the connection string
    Postgres(String),
}

impl StorageConfig {
    /// Detect the storage configuration from the environment
    ///
    /// - `STORAGE`: `local` (default) or `postgres`
    /// - `NOTES_FILE`: file for local storage, memory only when not set
    /// - `DATABASE_URL`: required for `postgres`
    ///
    /// # Errors
    ///
    /// Will return `Err` for an unknown storage or a missing database URL
    pub fn from_env() -> Result<Self> {
        let storage = env_var("STORAGE").unwrap_or_else(|| "local".to_string());

        match storage.as_str() {
            "local" => Ok(env_var("NOTES_FILE")
                .map_or(Self::Memory, |path| Self::File(path.into()))),
            "postgres" => env_var("DATABASE_URL")
                .map(Self::Postgres)
                .context("`DATABASE_URL` is required for the postgres storage"),
            other => bail!(r#"Unknown storage "{other}", use "local" or "postgres""#),
        }
    }
}

/// Everything needed to run the app
#[derive(Clone, Debug)]
pub struct Config {
    /// Address to listen on
    pub address: SocketAddr,

    /// Storage backend
    pub storage: StorageConfig,

    /// How notes without text are listed
    pub display_policy: DisplayPolicy,

    /// Secret to sign tokens with
    pub jwt_secret: String,
}

impl Config {
    /// Read the configuration from the environment
    ///
    /// # Errors
    ///
    /// Will return `Err` when any variable has an invalid value
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            address: address_from_env()?,
            storage: StorageConfig::from_env()?,
            display_policy: display_policy_from_env()?,
            jwt_secret: jwt_secret_from_env(),
        })
    }
}

fn address_from_env() -> Result<SocketAddr> {
    let mut address = env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS))
        .parse::<SocketAddr>()
        .context("Invalid `ADDRESS`")?;

    // optional override of just the port
    if let Some(port) = env_var("PORT") {
        let port = port.parse::<u16>().context("Invalid `PORT`")?;

        address.set_port(port);
    }

    Ok(address)
}

fn display_policy_from_env() -> Result<DisplayPolicy> {
    let hide_empty_text = match env_var("HIDE_EMPTY_NOTES").as_deref() {
        None | Some("false" | "0") => false,
        Some("true" | "1") => true,
        Some(other) => bail!(r#"Invalid `HIDE_EMPTY_NOTES` "{other}", use "true" or "false""#),
    };

    Ok(DisplayPolicy { hide_empty_text })
}

fn jwt_secret_from_env() -> String {
    use crate::password::generate;

    env_var_or_else("JWT_SECRET", || {
        let jwt_secret = generate();
        tracing::info!("`JWT_SECRET` is not set, generating temporary one");
        jwt_secret
    })
}

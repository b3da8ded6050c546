//! Configuration loaded from `ybeasy.toml`.
//!
//! ```toml
//! [connection]
//! host = "yb89"
//! dbuser = "dze"
//! conn_db = "stores"
//! current_schema = "dev"
//! connect_timeout = 10
//!
//! [client]
//! program = "ybsql"
//!
//! [paths]
//! install_dir = "/opt/ybeasy"
//! ```
//!
//! Unset connection values are left to the client's own environment
//! (`YBHOST`, `YBUSER`, ...).

use crate::error::{YbError, YbResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "ybeasy.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub client: ClientConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbuser: Option<String>,
    /// Handed to the client as `YBPASSWORD`.
    pub password: Option<String>,
    pub conn_db: Option<String>,
    /// Schema set with `SET SCHEMA` before every statement.
    pub current_schema: Option<String>,
    /// Seconds the client waits for a connection.
    pub connect_timeout: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            dbuser: None,
            password: None,
            conn_db: None,
            current_schema: None,
            connect_timeout: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub program: String,
    /// Unaligned, quiet, rows only, stop on first error, skip `~/.ybsqlrc`.
    pub options: String,
    /// First component of the `ybd_query_tags` set on every statement.
    pub query_tag: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program: "ybsql".to_string(),
            options: "-A -q -t -v ON_ERROR_STOP=1 -X".to_string(),
            query_tag: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `sql/<procedure>.sql`.
    pub install_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(content: &str) -> YbResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> YbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| YbError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the first config found: `explicit`, `./ybeasy.toml`, then
    /// `<config dir>/ybeasy/config.toml`. Falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> YbResult<Self> {
        if let Some(path) = explicit {
            debug!("loading config {}", path.display());
            return Self::from_file(path);
        }

        let candidates = [
            Some(PathBuf::from(CONFIG_FILE)),
            dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("config.toml")),
        ];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                debug!("loading config {}", path.display());
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Install directory, defaulting to the directory of the running binary.
    pub fn install_dir(&self) -> PathBuf {
        if let Some(dir) = &self.paths.install_dir {
            return dir.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

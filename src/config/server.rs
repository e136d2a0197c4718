use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_MAX_EVIDENCE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Hard ceiling for a single evidence upload. The `upload.max_evidence_bytes`
    /// setting may lower it at runtime but never raise it.
    pub max_evidence_bytes: usize,
    pub max_import_bytes: usize,
}

/// Optional on-disk overrides, read from a TOML file passed with `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub max_evidence_bytes: Option<usize>,
    pub max_import_bytes: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("sakip.db")
    }

    #[must_use]
    pub fn admin_token_path(&self) -> PathBuf {
        self.data_dir.join(".admin_token")
    }

    /// Applies file values on top of the current config. Call before applying
    /// explicit CLI flags so the flags win.
    #[must_use]
    pub fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(data_dir) = file.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(max) = file.max_evidence_bytes {
            self.max_evidence_bytes = max;
        }
        if let Some(max) = file.max_import_bytes {
            self.max_import_bytes = max;
        }
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            max_evidence_bytes: DEFAULT_MAX_EVIDENCE_BYTES,
            max_import_bytes: DEFAULT_MAX_IMPORT_BYTES,
        }
    }
}

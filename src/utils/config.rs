use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::{ConnectionInfo, Dialect};
use crate::error::{Result, ScriptError};

const MAX_SAVED_CONNECTIONS: usize = 10;
const DEFAULT_PARSE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub connections: Vec<ConnectionInfo>,
    pub last_connection: Option<String>,
    pub default_dialect: String,
    pub parse_timeout_secs: u64,
    /// 0 uses the available parallelism.
    pub max_workers: usize,
    pub stop_on_error: bool,
    pub transactional: bool,
    pub print_statements: bool,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            last_connection: None,
            default_dialect: Dialect::Oracle.name().to_string(),
            parse_timeout_secs: DEFAULT_PARSE_TIMEOUT_SECS,
            max_workers: 0,
            stop_on_error: true,
            transactional: false,
            print_statements: false,
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("sqlrun");
            path.push("config.json");
            path
        })
    }

    /// Missing or unparsable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "Ignoring invalid config")
                    }
                },
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Config not readable")
                }
            }
        }
        Self::new()
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| config_error(path, err))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|err| ScriptError::Config(err.to_string()))?;
        fs::write(path, content).map_err(|err| config_error(path, err))?;
        tracing::debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn add_connection(&mut self, info: ConnectionInfo) {
        self.connections.retain(|c| c.name != info.name);
        self.last_connection = Some(info.name.clone());
        self.connections.insert(0, info);
        self.connections.truncate(MAX_SAVED_CONNECTIONS);
    }

    pub fn get_connection_by_name(&self, name: &str) -> Option<&ConnectionInfo> {
        self.connections.iter().find(|c| c.name == name)
    }

    pub fn remove_connection(&mut self, name: &str) {
        self.connections.retain(|c| c.name != name);
        if self.last_connection.as_deref() == Some(name) {
            self.last_connection = None;
        }
    }

    pub fn default_dialect(&self) -> Result<Dialect> {
        self.default_dialect.parse()
    }

    /// 0 falls back to the default of ten seconds.
    pub fn parse_timeout(&self) -> Duration {
        match self.parse_timeout_secs {
            0 => Duration::from_secs(DEFAULT_PARSE_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn config_error(path: &Path, err: std::io::Error) -> ScriptError {
    tracing::error!(path = %path.display(), error = %err, "Config persistence error");
    ScriptError::Config(format!("{}: {}", path.display(), err))
}

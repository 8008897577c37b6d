use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::constants::*;

const DEFAULT_INSTALL_COMMAND: &str = "npm install";
const DEFAULT_START_COMMAND: &str = "npm run start";
const DEFAULT_MANIFEST: &str = "package.json";
const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {source}")]
    InvalidNumber {
        var: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("{0} must name a command")]
    EmptyCommand(&'static str),
    #[error("Unable to determine home directory; set PLAYGROUND_DATA_DIR")]
    NoHomeDirectory,
}

/// Command line split into program and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    fn parse(var: &'static str, raw: &str) -> Result<Self, ConfigError> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::EmptyCommand(var))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Runtime settings resolved from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub sandbox_dir: PathBuf,
    pub install_command: CommandLine,
    pub start_command: CommandLine,
    pub manifest: String,
    pub ready_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup(PLAYGROUND_DATA_DIR) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_data_dir(&lookup)?,
        };

        let db_path = lookup(PLAYGROUND_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("playground.db"));

        let sandbox_dir = lookup(PLAYGROUND_SANDBOX_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("sandboxes"));

        let install_command = CommandLine::parse(
            PLAYGROUND_INSTALL_COMMAND,
            &lookup(PLAYGROUND_INSTALL_COMMAND).unwrap_or_else(|| DEFAULT_INSTALL_COMMAND.to_string()),
        )?;

        let start_command = CommandLine::parse(
            PLAYGROUND_START_COMMAND,
            &lookup(PLAYGROUND_START_COMMAND).unwrap_or_else(|| DEFAULT_START_COMMAND.to_string()),
        )?;

        let manifest = lookup(PLAYGROUND_MANIFEST)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MANIFEST.to_string());

        let ready_timeout_secs = match lookup(PLAYGROUND_READY_TIMEOUT_SECS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|source| ConfigError::InvalidNumber {
                    var: PLAYGROUND_READY_TIMEOUT_SECS,
                    source,
                })?,
            None => DEFAULT_READY_TIMEOUT_SECS,
        };
        if ready_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout(PLAYGROUND_READY_TIMEOUT_SECS));
        }

        let settings = Self {
            data_dir,
            db_path,
            sandbox_dir,
            install_command,
            start_command,
            manifest,
            ready_timeout: Duration::from_secs(ready_timeout_secs),
        };
        debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }
}

/// `~/.playground`, preferring `$HOME` so tests can redirect it
fn default_data_dir<F>(lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let home = match lookup(HOME) {
        Some(home) => PathBuf::from(home),
        None => dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?,
    };
    Ok(home.join(".playground"))
}

// ABOUTME: Core type definitions for sandbox provisioning
// ABOUTME: Bootstrap states, commands, readiness events, log entries and filesystem changes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of visible bootstrap steps (transform, mount, install, start)
pub const TOTAL_STEPS: u8 = 4;

/// Bootstrap lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapState {
    /// Nothing has happened yet
    Idle,
    /// Building the mount map from the snapshot
    Transforming,
    /// Writing the mount map into the sandbox filesystem
    Mounting,
    /// Running the dependency installation
    Installing,
    /// Start command launched, waiting for the server-ready notification
    Starting,
    /// Server reported a URL
    Ready,
    /// A step failed; see `BootstrapStatus::error`
    Error,
}

impl BootstrapState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapState::Idle => "idle",
            BootstrapState::Transforming => "transforming",
            BootstrapState::Mounting => "mounting",
            BootstrapState::Installing => "installing",
            BootstrapState::Starting => "starting",
            BootstrapState::Ready => "ready",
            BootstrapState::Error => "error",
        }
    }

    /// Progress step shown alongside the state, `0..=TOTAL_STEPS`
    pub fn step(&self) -> Option<u8> {
        match self {
            BootstrapState::Idle => Some(0),
            BootstrapState::Transforming => Some(1),
            BootstrapState::Mounting => Some(2),
            BootstrapState::Installing => Some(3),
            BootstrapState::Starting | BootstrapState::Ready => Some(TOTAL_STEPS),
            BootstrapState::Error => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapState::Ready | BootstrapState::Error)
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable bootstrap status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapStatus {
    pub state: BootstrapState,
    /// Last step reached, kept when entering `Error` so progress can be shown
    pub step: u8,
    pub error: Option<String>,
    pub preview_url: Option<String>,
    pub port: Option<u16>,
}

impl Default for BootstrapStatus {
    fn default() -> Self {
        Self {
            state: BootstrapState::Idle,
            step: 0,
            error: None,
            preview_url: None,
            port: None,
        }
    }
}

/// What a call to the bootstrap entry point did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Fresh sandbox: transformed, mounted, installed and started
    Provisioned,
    /// Manifest already present: only re-subscribed for readiness
    Resumed,
    /// No-op, a previous bootstrap completed
    AlreadyComplete,
    /// No-op, another bootstrap is in flight
    InProgress,
}

/// A program and its arguments, run inside the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Server-ready notification emitted by a runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

/// Where a log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// Bootstrap progress messages
    System,
    /// Output of the dependency installation
    Install,
    /// Output of the started server
    Server,
}

/// Line forwarded to the terminal collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub message: String,
}

impl LogEntry {
    pub fn new(source: LogSource, message: impl Into<String>) -> Self {
        Self {
            id: nanoid::nanoid!(10),
            timestamp: Utc::now(),
            source,
            message: message.into(),
        }
    }
}

/// Filesystem change to replay into a live sandbox after a structural edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FsChange {
    WriteFile { path: String, content: String },
    CreateDir { path: String },
    Remove { path: String },
    Rename { from: String, to: String },
}

impl FsChange {
    /// Path the change is about, for error reporting
    pub fn path(&self) -> &str {
        match self {
            FsChange::WriteFile { path, .. } | FsChange::CreateDir { path } | FsChange::Remove { path } => path,
            FsChange::Rename { from, .. } => from,
        }
    }
}

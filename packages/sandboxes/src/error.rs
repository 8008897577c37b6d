// ABOUTME: Error types for sandbox provisioning
// ABOUTME: Filesystem, process and readiness failures raised by runtimes and the bootstrap

use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Path escapes the sandbox root or is otherwise unusable
    #[error("Invalid sandbox path: {0}")]
    InvalidPath(String),

    /// File does not exist inside the sandbox
    #[error("File not found in sandbox: {0}")]
    FileNotFound(String),

    /// Batch mount of the project files failed
    #[error("Failed to mount files: {0}")]
    MountFailed(String),

    /// Targeted single-file write failed
    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    /// Process could not be started
    #[error("Failed to spawn process '{command}': {reason}")]
    ProcessSpawnFailed { command: String, reason: String },

    /// Dependency installation exited unsuccessfully
    #[error("Dependency installation failed with exit code {exit_code}")]
    InstallFailed { exit_code: i32 },

    /// Start command could not be launched
    #[error("Failed to start server: {0}")]
    StartFailed(String),

    /// Server never reported ready
    #[error("Server did not become ready within {seconds} seconds")]
    ReadyTimeout { seconds: u64 },

    /// Bootstrap was torn down while waiting
    #[error("Sandbox was shut down")]
    ShutDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;

// ABOUTME: Error types surfaced by the editing session
// ABOUTME: Wraps tree, persistence and sandbox failures with the operation that hit them

use playground_core::TreeError;
use playground_sandboxes::SandboxError;
use playground_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Document store write or read failed; the in-memory snapshot is kept
    #[error("Failed to persist project during {operation}: {source}")]
    PersistenceFailure {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("Sandbox {operation} failed{}: {source}", at_path(.path))]
    SandboxFailure {
        operation: &'static str,
        path: Option<String>,
        #[source]
        source: SandboxError,
    },

    #[error("No active buffer")]
    NoActiveBuffer,

    #[error("No sandbox attached to this session")]
    NoSandbox,
}

fn at_path(path: &Option<String>) -> String {
    match path {
        Some(path) => format!(" at '{}'", path),
        None => String::new(),
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

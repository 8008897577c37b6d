// ABOUTME: Error types for tree lookups and structural edits
// ABOUTME: Shared by the buffer manager, the mutator and the sandbox transformer

use thiserror::Error;

/// Errors raised while resolving or editing a file tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Entity or path is not reachable from the snapshot root
    #[error("Not found: {0}")]
    NotFound(String),

    /// A sibling with the same name already exists
    #[error("An item named '{name}' already exists in '{parent}'")]
    DuplicateName { name: String, parent: String },

    /// The target container does not exist (or is not a folder)
    #[error("Parent folder not found: {0}")]
    ParentNotFound(String),

    /// An open buffer no longer maps to a file in the current snapshot
    #[error("Path not found in current tree: {0}")]
    PathNotFound(String),

    /// Name rejected by validation
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result alias for tree operations
pub type TreeResult<T> = std::result::Result<T, TreeError>;

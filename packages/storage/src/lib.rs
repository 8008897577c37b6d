// ABOUTME: Persistence gateway for project file trees
// ABOUTME: Defines the TreeStore trait, its errors and the SQLite implementation

use async_trait::async_trait;
use playground_core::TemplateFolder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod sqlite;

pub use sqlite::SqliteTreeStore;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No saved tree for project: {0}")]
    NotFound(String),
    #[error("Invalid project id '{project_id}': {reason}")]
    InvalidProjectId { project_id: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub enable_wal: bool,
    pub max_connections: u32,
    pub busy_timeout_seconds: u64,
}

impl StorageConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enable_wal: true,
            max_connections: 5,
            busy_timeout_seconds: 30,
        }
    }
}

/// Document store holding one serialized tree per project.
///
/// `save` always receives the full snapshot; there is no diffing at this layer.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Load the stored tree, or `StorageError::NotFound`
    async fn load(&self, project_id: &str) -> StorageResult<TemplateFolder>;

    /// Overwrite the stored tree and return it as persisted
    async fn save(&self, project_id: &str, snapshot: &TemplateFolder) -> StorageResult<TemplateFolder>;
}

/// Validate a project id before it reaches a query or a directory name.
///
/// Project ids may contain only alphanumeric characters, hyphens, and
/// underscores; this keeps them safe to reuse as sandbox directory names.
pub fn validate_project_id(project_id: &str) -> StorageResult<()> {
    let reject = |reason: &str| StorageError::InvalidProjectId {
        project_id: project_id.to_string(),
        reason: reason.to_string(),
    };

    if project_id.is_empty() {
        return Err(reject("Project ID cannot be empty"));
    }

    if project_id.contains("..") || project_id.contains('/') || project_id.contains('\\') {
        return Err(reject("Project ID cannot contain path traversal sequences (.. / \\)"));
    }

    if !project_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(reject(
            "Project ID can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }

    Ok(())
}

use async_trait::async_trait;
use chrono::Utc;
use playground_core::TemplateFolder;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::{validate_project_id, StorageConfig, StorageError, StorageResult, TreeStore};

/// SQLite implementation of TreeStore
pub struct SqliteTreeStore {
    pool: SqlitePool,
}

impl SqliteTreeStore {
    /// Create a new store, creating the database file if needed
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let database_url = format!("sqlite:{}", config.path.display());

        if !sqlx::Sqlite::database_exists(&database_url).await? {
            debug!("Creating database at: {}", database_url);
            sqlx::Sqlite::create_database(&database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.busy_timeout_seconds))
            .connect(&database_url)
            .await?;

        if config.enable_wal {
            sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        }

        sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Run embedded migrations
    pub async fn initialize(&self) -> StorageResult<()> {
        info!("Initializing SQLite tree store with migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Ids of every project with a stored tree, most recently updated first
    pub async fn project_ids(&self) -> StorageResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT project_id FROM template_files ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn fetch_content(&self, project_id: &str) -> StorageResult<Option<String>> {
        let content: Option<String> = sqlx::query_scalar("SELECT content FROM template_files WHERE project_id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(content)
    }
}

#[async_trait]
impl TreeStore for SqliteTreeStore {
    async fn load(&self, project_id: &str) -> StorageResult<TemplateFolder> {
        validate_project_id(project_id)?;

        let content = self
            .fetch_content(project_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(project_id.to_string()))?;

        let snapshot: TemplateFolder = serde_json::from_str(&content)?;
        debug!(
            "Loaded tree for project {} ({} files)",
            project_id,
            snapshot.file_count()
        );
        Ok(snapshot)
    }

    async fn save(&self, project_id: &str, snapshot: &TemplateFolder) -> StorageResult<TemplateFolder> {
        validate_project_id(project_id)?;

        let content = serde_json::to_string(snapshot)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO template_files (project_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(project_id)
        .bind(&content)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!("Saved tree for project {} ({} bytes)", project_id, content.len());

        let stored = self.fetch_content(project_id).await?.ok_or_else(|| {
            StorageError::Database(format!("Tree for project {} vanished after save", project_id))
        })?;
        Ok(serde_json::from_str(&stored)?)
    }
}

// ABOUTME: Integration tests for the SQLite tree store
// ABOUTME: Round-trips, overwrites, missing projects and id validation

use playground_core::{ItemPath, TemplateFile, TemplateFolder};
use playground_storage::{SqliteTreeStore, StorageConfig, StorageError, TreeStore};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Helper to set up a migrated store in a temporary directory
async fn setup_test_store() -> (SqliteTreeStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        enable_wal: false, // WAL doesn't work well with temporary files
        ..StorageConfig::at(temp_dir.path().join("test.db"))
    };

    let store = SqliteTreeStore::new(config).await.unwrap();
    store.initialize().await.unwrap();

    (store, temp_dir)
}

fn sample_tree() -> TemplateFolder {
    TemplateFolder::new("react-starter")
        .with_item(TemplateFile::new("package", "json", r#"{"scripts":{"start":"vite"}}"#))
        .with_item(
            TemplateFolder::new("src")
                .with_item(TemplateFile::new("main", "jsx", "import App from './App'"))
                .with_item(TemplateFolder::new("components")),
        )
        .with_item(TemplateFile::new("Dockerfile", "", "FROM node:20"))
}

#[tokio::test]
async fn test_save_then_load_round_trips() {
    let (store, _temp_dir) = setup_test_store().await;
    let tree = sample_tree();

    let persisted = store.save("project-1", &tree).await.unwrap();
    assert_eq!(persisted, tree);

    let loaded = store.load("project-1").await.unwrap();
    assert_eq!(loaded, tree);
    assert!(loaded.folder_at(&ItemPath::parse("src/components")).is_some());
}

#[tokio::test]
async fn test_save_overwrites_whole_record() {
    let (store, _temp_dir) = setup_test_store().await;
    store.save("project-1", &sample_tree()).await.unwrap();

    let replacement = TemplateFolder::new("react-starter").with_item(TemplateFile::new("index", "html", ""));
    store.save("project-1", &replacement).await.unwrap();

    let loaded = store.load("project-1").await.unwrap();
    assert_eq!(loaded, replacement);
    assert_eq!(store.project_ids().await.unwrap(), vec!["project-1".to_string()]);
}

#[tokio::test]
async fn test_load_missing_project_is_not_found() {
    let (store, _temp_dir) = setup_test_store().await;

    match store.load("nobody").await {
        Err(StorageError::NotFound(id)) => assert_eq!(id, "nobody"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_project_id_is_rejected_before_query() {
    let (store, _temp_dir) = setup_test_store().await;

    let result = store.save("../escape", &sample_tree()).await;
    assert!(matches!(result, Err(StorageError::InvalidProjectId { .. })));
}

#[tokio::test]
async fn test_projects_are_isolated() {
    let (store, _temp_dir) = setup_test_store().await;
    let other = TemplateFolder::new("other");

    store.save("first", &sample_tree()).await.unwrap();
    store.save("second", &other).await.unwrap();

    assert_eq!(store.load("first").await.unwrap(), sample_tree());
    assert_eq!(store.load("second").await.unwrap(), other);
}

#[tokio::test]
async fn test_reopening_store_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        enable_wal: false,
        ..StorageConfig::at(temp_dir.path().join("nested/dir/test.db"))
    };

    {
        let store = SqliteTreeStore::new(config.clone()).await.unwrap();
        store.initialize().await.unwrap();
        store.save("persisted", &sample_tree()).await.unwrap();
        store.pool().close().await;
    }

    let store = SqliteTreeStore::new(config).await.unwrap();
    store.initialize().await.unwrap();
    assert_eq!(store.load("persisted").await.unwrap(), sample_tree());
}

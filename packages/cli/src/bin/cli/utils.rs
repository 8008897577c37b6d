// ABOUTME: Shared CLI helpers: logging setup, store access and tree rendering
// ABOUTME: Log filter comes from PLAYGROUND_LOG, falling back to info

use anyhow::{Context, Result};
use colored::*;
use playground_config::constants::PLAYGROUND_LOG;
use playground_config::Settings;
use playground_core::{TemplateFolder, TemplateItem};
use playground_storage::{SqliteTreeStore, StorageConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Load the nearest `.env` at or above `dir`. Variables already set in the
/// process environment win over the file.
pub fn load_env_file(dir: &Path) -> Option<PathBuf> {
    let path = dir.ancestors().map(|dir| dir.join(".env")).find(|path| path.is_file())?;
    dotenvy::from_path(&path).ok()?;
    Some(path)
}

/// Install the global tracing subscriber, writing to stderr
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(PLAYGROUND_LOG).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Open and migrate the project store
pub async fn open_store(settings: &Settings) -> Result<SqliteTreeStore> {
    let store = SqliteTreeStore::new(StorageConfig::at(&settings.db_path))
        .await
        .with_context(|| format!("Failed to open database at {}", settings.db_path.display()))?;
    store.initialize().await.context("Failed to run database migrations")?;
    Ok(store)
}

/// Indented listing of a tree in stored item order
pub fn render_tree(folder: &TemplateFolder) -> Vec<String> {
    let mut lines = Vec::new();
    render_items(folder, 0, &mut lines);
    lines
}

fn render_items(folder: &TemplateFolder, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for item in &folder.items {
        match item {
            TemplateItem::Folder(child) => {
                lines.push(format!("{}{}/", indent, child.folder_name));
                render_items(child, depth + 1, lines);
            }
            TemplateItem::File(file) => {
                lines.push(format!("{}{} ({} bytes)", indent, file.display_name(), file.content.len()));
            }
        }
    }
}

/// Colorize one rendered line for terminal output
pub fn paint(line: &str) -> ColoredString {
    if line.trim_end().ends_with('/') {
        line.blue().bold()
    } else {
        line.normal()
    }
}

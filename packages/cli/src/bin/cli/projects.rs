// ABOUTME: CLI commands for stored project trees (import, list, show, export)
// ABOUTME: Reads and writes the SQLite document store configured through the environment

use anyhow::{anyhow, Context, Result};
use colored::*;
use playground_config::Settings;
use playground_core::scan_directory;
use playground_storage::{validate_project_id, TreeStore};
use std::path::{Path, PathBuf};

use super::utils::{open_store, paint, render_tree};

pub async fn import(settings: &Settings, dir: &Path, project: Option<String>) -> Result<()> {
    let project_id = match project {
        Some(id) => id,
        None => project_id_from_dir(dir)?,
    };
    validate_project_id(&project_id)?;

    let root = dir.to_path_buf();
    let snapshot = tokio::task::spawn_blocking(move || scan_directory(root))
        .await
        .context("Directory scan was interrupted")?
        .with_context(|| format!("Failed to read {}", dir.display()))?;

    let store = open_store(settings).await?;
    let stored = store.save(&project_id, &snapshot).await?;

    println!(
        "{} Imported {} files into project {}",
        "✓".green(),
        stored.file_count(),
        project_id.cyan()
    );
    Ok(())
}

pub async fn list(settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;
    let ids = store.project_ids().await?;

    if ids.is_empty() {
        println!("{}", "No projects found".yellow());
        println!("{}", "Use 'playground import <dir>' to create one".dimmed());
        return Ok(());
    }

    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

pub async fn show(settings: &Settings, project_id: &str) -> Result<()> {
    let store = open_store(settings).await?;
    let snapshot = store
        .load(project_id)
        .await
        .with_context(|| format!("Failed to load project {}", project_id))?;

    println!("{} ({} files)", project_id.cyan().bold(), snapshot.file_count());
    for line in render_tree(&snapshot) {
        println!("  {}", paint(&line));
    }
    Ok(())
}

pub async fn export(settings: &Settings, project_id: &str, output: Option<PathBuf>) -> Result<()> {
    let store = open_store(settings).await?;
    let snapshot = store
        .load(project_id)
        .await
        .with_context(|| format!("Failed to load project {}", project_id))?;
    let json = serde_json::to_string_pretty(&snapshot)?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Exported {} to {}", "✓".green(), project_id, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Directory name with anything outside `[A-Za-z0-9_-]` replaced by `-`
fn project_id_from_dir(dir: &Path) -> Result<String> {
    let name = dir
        .canonicalize()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .ok_or_else(|| anyhow!("Cannot derive a project ID from {}; pass --project", dir.display()))?;

    Ok(name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_id_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("my app.v2");
        std::fs::create_dir(&dir).unwrap();

        assert_eq!(project_id_from_dir(&dir).unwrap(), "my-app-v2");
    }

    #[test]
    fn test_project_id_from_missing_dir() {
        assert!(project_id_from_dir(Path::new("/definitely/not/here")).is_err());
    }
}

// ABOUTME: Flattens a tree snapshot into the path -> content map a sandbox is seeded with
// ABOUTME: Also maps an open buffer's id back to its sandbox path for targeted writes

use playground_core::{FileId, ItemPath, TemplateFolder, TemplateItem, TreeError, TreeResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Flat representation of a snapshot, keyed by sandbox-relative path.
///
/// Paths use `/` and carry no leading slash (`src/index.js`). Folders are kept
/// apart from files so that empty folders still get created while the entry
/// count only reflects files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountMap {
    files: BTreeMap<String, String>,
    directories: BTreeSet<String>,
}

impl MountMap {
    /// Number of file entries
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains_dir(&self, path: &str) -> bool {
        self.directories.contains(path)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(path, content)| (path.as_str(), content.as_str()))
    }

    /// Directory paths, parents sorted before their children
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.directories.iter().map(String::as_str)
    }

    fn add_file(&mut self, path: String, content: String) {
        if let Some(previous) = self.files.insert(path.clone(), content) {
            // Only reachable with hand-edited stored trees; the mutator refuses duplicates
            warn!("Duplicate path in snapshot, keeping last: {} ({} bytes dropped)", path, previous.len());
        }
    }
}

/// Depth-first walk producing one entry per file
pub fn to_mount_map(snapshot: &TemplateFolder) -> MountMap {
    let mut map = MountMap::default();
    collect(snapshot, &ItemPath::root(), &mut map);
    map
}

fn collect(folder: &TemplateFolder, base: &ItemPath, map: &mut MountMap) {
    for item in &folder.items {
        match item {
            TemplateItem::File(file) => {
                let path = base.join(file.display_name());
                map.add_file(path.to_string(), file.content.clone());
            }
            TemplateItem::Folder(child) => {
                let path = base.join(child.folder_name.as_str());
                map.directories.insert(path.to_string());
                collect(child, &path, map);
            }
        }
    }
}

/// Sandbox path of the file an open buffer refers to.
///
/// Fails with `PathNotFound` when the file is no longer in `snapshot`, e.g.
/// because it was deleted while the buffer stayed open.
pub fn resolve_file_path(id: &FileId, snapshot: &TemplateFolder) -> TreeResult<String> {
    let path = id.to_path();
    match snapshot.file_at(&path) {
        Some(_) => Ok(path.to_string()),
        None => Err(TreeError::PathNotFound(id.to_string())),
    }
}

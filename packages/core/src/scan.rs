// ABOUTME: Builds a snapshot from a directory on the host filesystem
// ABOUTME: Used to seed a project from a starter template folder

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::types::{TemplateFile, TemplateFolder};

/// Directories never imported into a snapshot
const IGNORED_DIRECTORIES: &[&str] = &["node_modules", ".git", ".next", "dist", "build", "target"];

/// Files never imported into a snapshot
const IGNORED_FILES: &[&str] = &["package-lock.json", "yarn.lock", "pnpm-lock.yaml", ".DS_Store"];

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        IGNORED_DIRECTORIES.contains(&name.as_ref())
    } else {
        IGNORED_FILES.contains(&name.as_ref())
    }
}

/// Read `root` recursively into a snapshot named after the directory.
///
/// Entries are sorted by name so repeated imports produce identical trees.
/// Files that are not valid UTF-8 are skipped, as are symlinks.
pub fn scan_directory(root: impl AsRef<Path>) -> io::Result<TemplateFolder> {
    let root = root.as_ref();
    debug!("Scanning template directory: {}", root.display());

    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Template directory does not exist: {}", root.display()),
        ));
    }

    let root_name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());

    // Open folders from the root down to the current entry's parent
    let mut stack: Vec<TemplateFolder> = vec![TemplateFolder::new(root_name)];

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry));

    for entry in walker {
        let entry = entry?;
        close_folders_deeper_than(&mut stack, entry.depth());

        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().is_dir() {
            stack.push(TemplateFolder::new(name));
        } else if entry.file_type().is_file() {
            let bytes = fs::read(entry.path())?;
            match String::from_utf8(bytes) {
                Ok(content) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.items.push(TemplateFile::from_name(&name, content).into());
                    }
                }
                Err(_) => warn!("Skipping non UTF-8 file: {}", entry.path().display()),
            }
        }
    }

    close_folders_deeper_than(&mut stack, 1);
    stack.pop().ok_or_else(|| io::Error::other("template scan lost its root folder"))
}

/// Pop finished folders into their parents until `stack.len() == depth`
fn close_folders_deeper_than(stack: &mut Vec<TemplateFolder>, depth: usize) {
    while stack.len() > depth {
        let Some(done) = stack.pop() else { break };
        match stack.last_mut() {
            Some(parent) => parent.items.push(done.into()),
            None => {
                stack.push(done);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ItemPath;
    use tempfile::TempDir;

    #[test]
    fn test_scan_builds_nested_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("package.json"), "{\"name\":\"demo\"}").unwrap();
        fs::create_dir_all(root.join("src/components")).unwrap();
        fs::write(root.join("src/index.js"), "console.log(1)").unwrap();
        fs::write(root.join("src/components/Button.jsx"), "export default 1").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();

        let tree = scan_directory(root).unwrap();

        assert_eq!(tree.file_count(), 3);
        assert_eq!(
            tree.file_at(&ItemPath::parse("src/components/Button.jsx")).unwrap().content,
            "export default 1"
        );
        assert!(tree.folder_at(&ItemPath::parse("empty")).is_some());
        // Sorted by name: empty, package.json, src
        let names: Vec<String> = tree.items.iter().map(|i| i.name().into_owned()).collect();
        assert_eq!(names, vec!["empty", "package.json", "src"]);
    }

    #[test]
    fn test_scan_skips_ignored_entries() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("node_modules/react")).unwrap();
        fs::write(root.join("node_modules/react/index.js"), "").unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();
        fs::write(root.join("binary.bin"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();

        let tree = scan_directory(root).unwrap();

        assert_eq!(tree.file_count(), 1);
        assert!(tree.child("node_modules").is_none());
        assert!(tree.child("index.html").is_some());
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan_directory(temp_dir.path().join("missing"));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}

// ABOUTME: Structural edits over tree snapshots: add, delete and rename files and folders
// ABOUTME: Each edit yields a new snapshot plus the sandbox changes it implies and updates open buffers

use playground_core::{
    validate_file_name, validate_name, FileId, ItemPath, TemplateFile, TemplateFolder, TemplateItem, TreeError,
    TreeResult,
};
use playground_sandboxes::FsChange;
use tracing::debug;

use crate::buffers::BufferManager;

/// Outcome of a structural edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub snapshot: TemplateFolder,
    /// Filesystem changes to replay into a live sandbox
    pub changes: Vec<FsChange>,
}

/// Structural operations on tree snapshots.
///
/// The input snapshot is never modified. Validation runs before buffers are
/// touched, so a failed edit leaves both the snapshot and the buffers as they
/// were.
pub struct TreeMutator;

impl TreeMutator {
    pub fn add_file(snapshot: &TemplateFolder, file: TemplateFile, parent: &ItemPath) -> TreeResult<Mutation> {
        validate_file_name(&file.filename, &file.file_extension)?;

        let mut next = snapshot.clone();
        let folder = parent_mut(&mut next, parent)?;
        let name = file.display_name().into_owned();
        ensure_unique(folder, &name, parent, None)?;

        let path = parent.join(name);
        let change = FsChange::WriteFile {
            path: path.to_string(),
            content: file.content.clone(),
        };
        folder.items.push(file.into());
        debug!("Added file {}", path);

        Ok(Mutation {
            snapshot: next,
            changes: vec![change],
        })
    }

    pub fn add_folder(snapshot: &TemplateFolder, new_folder: TemplateFolder, parent: &ItemPath) -> TreeResult<Mutation> {
        validate_name(&new_folder.folder_name)?;

        let mut next = snapshot.clone();
        let folder = parent_mut(&mut next, parent)?;
        ensure_unique(folder, &new_folder.folder_name, parent, None)?;

        let path = parent.join(new_folder.folder_name.as_str());
        let mut changes = vec![FsChange::CreateDir { path: path.to_string() }];
        // A folder may arrive pre-populated, e.g. from a template
        for nested in new_folder.folders() {
            changes.push(FsChange::CreateDir {
                path: join_all(&path, &nested).to_string(),
            });
        }
        for (nested, file) in new_folder.files() {
            changes.push(FsChange::WriteFile {
                path: join_all(&path, &nested).to_string(),
                content: file.content.clone(),
            });
        }

        folder.items.push(new_folder.into());
        debug!("Added folder {}", path);

        Ok(Mutation { snapshot: next, changes })
    }

    /// Remove a file and close its buffer
    pub fn delete_file(
        snapshot: &TemplateFolder,
        buffers: &mut BufferManager,
        name: &str,
        parent: &ItemPath,
    ) -> TreeResult<Mutation> {
        let mut next = snapshot.clone();
        let folder = parent_mut(&mut next, parent)?;
        let path = parent.join(name);
        let index = find_child(folder, name, true).ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        folder.items.remove(index);

        if !buffers.close(&FileId::from_path(&path)) {
            debug!("No open buffer for deleted file {}", path);
        }

        Ok(Mutation {
            snapshot: next,
            changes: vec![FsChange::Remove { path: path.to_string() }],
        })
    }

    /// Remove a folder and close every buffer beneath it
    pub fn delete_folder(
        snapshot: &TemplateFolder,
        buffers: &mut BufferManager,
        name: &str,
        parent: &ItemPath,
    ) -> TreeResult<Mutation> {
        let mut next = snapshot.clone();
        let folder = parent_mut(&mut next, parent)?;
        let path = parent.join(name);
        let index = find_child(folder, name, false).ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        folder.items.remove(index);

        let closed = buffers.close_prefix(&path);
        debug!("Deleted folder {}, closed {} buffers", path, closed);

        Ok(Mutation {
            snapshot: next,
            changes: vec![FsChange::Remove { path: path.to_string() }],
        })
    }

    /// Rename a file in place. Its open buffer follows it to the new id.
    pub fn rename_file(
        snapshot: &TemplateFolder,
        buffers: &mut BufferManager,
        name: &str,
        new_name: &str,
        new_extension: &str,
        parent: &ItemPath,
    ) -> TreeResult<Mutation> {
        validate_file_name(new_name, new_extension)?;

        let mut next = snapshot.clone();
        let folder = parent_mut(&mut next, parent)?;
        let old_path = parent.join(name);
        let index = find_child(folder, name, true).ok_or_else(|| TreeError::NotFound(old_path.to_string()))?;

        let renamed = TemplateFile::new(new_name, new_extension, "");
        let new_display = renamed.display_name().into_owned();
        ensure_unique(folder, &new_display, parent, Some(index))?;

        if let TemplateItem::File(file) = &mut folder.items[index] {
            file.filename = new_name.to_string();
            file.file_extension = new_extension.to_string();
        }

        if new_display == name {
            return Ok(Mutation {
                snapshot: next,
                changes: Vec::new(),
            });
        }

        let new_path = parent.join(new_display);
        buffers.rekey(
            &FileId::from_path(&old_path),
            FileId::from_path(&new_path),
            new_name,
            new_extension,
        );

        Ok(Mutation {
            snapshot: next,
            changes: vec![FsChange::Rename {
                from: old_path.to_string(),
                to: new_path.to_string(),
            }],
        })
    }

    /// Rename a folder in place; buffers for files beneath it are re-keyed
    pub fn rename_folder(
        snapshot: &TemplateFolder,
        buffers: &mut BufferManager,
        name: &str,
        new_name: &str,
        parent: &ItemPath,
    ) -> TreeResult<Mutation> {
        validate_name(new_name)?;

        let mut next = snapshot.clone();
        let folder = parent_mut(&mut next, parent)?;
        let old_path = parent.join(name);
        let index = find_child(folder, name, false).ok_or_else(|| TreeError::NotFound(old_path.to_string()))?;
        ensure_unique(folder, new_name, parent, Some(index))?;

        if new_name == name {
            return Ok(Mutation {
                snapshot: next,
                changes: Vec::new(),
            });
        }

        if let TemplateItem::Folder(renamed) = &mut folder.items[index] {
            renamed.folder_name = new_name.to_string();
        }

        let new_path = parent.join(new_name);
        let moved = buffers.rekey_prefix(&old_path, &new_path);
        debug!("Renamed folder {} -> {}, re-keyed {} buffers", old_path, new_path, moved);

        Ok(Mutation {
            snapshot: next,
            changes: vec![FsChange::Rename {
                from: old_path.to_string(),
                to: new_path.to_string(),
            }],
        })
    }

    /// Snapshot with the content of the file at `path` replaced
    pub fn update_file_content(snapshot: &TemplateFolder, path: &ItemPath, content: &str) -> TreeResult<TemplateFolder> {
        let mut next = snapshot.clone();
        let missing = || TreeError::PathNotFound(path.to_string());

        let name = path.name().ok_or_else(missing)?;
        let parent = path.parent().ok_or_else(missing)?;
        let folder = next.folder_at_mut(&parent).ok_or_else(missing)?;
        let index = find_child(folder, name, true).ok_or_else(missing)?;
        if let TemplateItem::File(file) = &mut folder.items[index] {
            file.content = content.to_string();
        }
        Ok(next)
    }
}

fn parent_mut<'a>(snapshot: &'a mut TemplateFolder, parent: &ItemPath) -> TreeResult<&'a mut TemplateFolder> {
    snapshot
        .folder_at_mut(parent)
        .ok_or_else(|| TreeError::ParentNotFound(describe(parent)))
}

/// Index of the child called `name`, only if it is of the requested kind
fn find_child(folder: &TemplateFolder, name: &str, file: bool) -> Option<usize> {
    folder
        .items
        .iter()
        .position(|item| item.is_file() == file && item.name() == name)
}

/// Sibling names compare by display name, so `app.js` collides with a folder called `app.js` too
fn ensure_unique(folder: &TemplateFolder, name: &str, parent: &ItemPath, except: Option<usize>) -> TreeResult<()> {
    let taken = folder
        .items
        .iter()
        .enumerate()
        .any(|(index, item)| Some(index) != except && item.name() == name);
    if taken {
        return Err(TreeError::DuplicateName {
            name: name.to_string(),
            parent: describe(parent),
        });
    }
    Ok(())
}

fn describe(path: &ItemPath) -> String {
    if path.is_root() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn join_all(base: &ItemPath, relative: &ItemPath) -> ItemPath {
    relative
        .segments()
        .iter()
        .fold(base.clone(), |path, segment| path.join(segment.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn project() -> TemplateFolder {
        TemplateFolder::new("root")
            .with_item(TemplateFile::new("app", "js", "app()"))
            .with_item(TemplateFile::new("index", "js", "a"))
            .with_item(
                TemplateFolder::new("src")
                    .with_item(TemplateFile::new("a", "js", "1"))
                    .with_item(TemplateFolder::new("sub").with_item(TemplateFile::new("b", "js", "2"))),
            )
    }

    fn root() -> ItemPath {
        ItemPath::root()
    }

    #[test]
    fn test_add_file_appends_at_end() {
        let tree = project();
        let mutation = TreeMutator::add_file(&tree, TemplateFile::new("c", "js", "3"), &ItemPath::parse("src")).unwrap();

        let src = mutation.snapshot.folder_at(&ItemPath::parse("src")).unwrap();
        assert_eq!(src.items.last().unwrap().name(), "c.js");
        assert_eq!(
            mutation.changes,
            vec![FsChange::WriteFile {
                path: "src/c.js".to_string(),
                content: "3".to_string()
            }]
        );
        // Input untouched
        assert!(tree.file_at(&ItemPath::parse("src/c.js")).is_none());
    }

    #[test]
    fn test_add_duplicate_leaves_snapshot_unchanged() {
        let tree = project();
        let before = tree.clone();

        let result = TreeMutator::add_file(&tree, TemplateFile::new("app", "js", ""), &root());

        assert_eq!(
            result.unwrap_err(),
            TreeError::DuplicateName {
                name: "app.js".to_string(),
                parent: "/".to_string()
            }
        );
        assert_eq!(tree, before);
    }

    #[rstest]
    #[case::same_case_other_name(TemplateFile::new("App", "js", "").into(), true)]
    #[case::other_extension(TemplateFile::new("app", "ts", "").into(), true)]
    #[case::nested_name_only(TemplateFile::new("a", "js", "").into(), true)]
    #[case::folder_over_file(TemplateFolder::new("app.js").into(), false)]
    #[case::file_over_folder(TemplateFile::new("src", "", "").into(), false)]
    #[case::folder_over_folder(TemplateFolder::new("src").into(), false)]
    fn test_name_collisions_are_case_sensitive_and_cross_kind(#[case] item: TemplateItem, #[case] allowed: bool) {
        let tree = project();
        let result = match item {
            TemplateItem::File(file) => TreeMutator::add_file(&tree, file, &root()),
            TemplateItem::Folder(folder) => TreeMutator::add_folder(&tree, folder, &root()),
        };

        if allowed {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(TreeError::DuplicateName { .. })));
        }
    }

    #[test]
    fn test_add_into_missing_or_file_parent() {
        let tree = project();
        assert_eq!(
            TreeMutator::add_file(&tree, TemplateFile::new("x", "js", ""), &ItemPath::parse("lib")).unwrap_err(),
            TreeError::ParentNotFound("lib".to_string())
        );
        assert!(matches!(
            TreeMutator::add_folder(&tree, TemplateFolder::new("x"), &ItemPath::parse("app.js")),
            Err(TreeError::ParentNotFound(_))
        ));
    }

    #[test]
    fn test_add_rejects_invalid_names() {
        let tree = project();
        assert!(matches!(
            TreeMutator::add_file(&tree, TemplateFile::new("", "js", ""), &root()),
            Err(TreeError::InvalidName { .. })
        ));
        assert!(matches!(
            TreeMutator::add_folder(&tree, TemplateFolder::new("a/b"), &root()),
            Err(TreeError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_add_populated_folder_lists_nested_changes() {
        let tree = project();
        let template = TemplateFolder::new("lib")
            .with_item(TemplateFile::new("x", "js", "x"))
            .with_item(TemplateFolder::new("deep"));

        let mutation = TreeMutator::add_folder(&tree, template, &ItemPath::parse("src")).unwrap();

        assert_eq!(
            mutation.changes,
            vec![
                FsChange::CreateDir { path: "src/lib".to_string() },
                FsChange::CreateDir { path: "src/lib/deep".to_string() },
                FsChange::WriteFile {
                    path: "src/lib/x.js".to_string(),
                    content: "x".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_delete_folder_closes_nested_buffers() {
        let tree = project();
        let mut buffers = BufferManager::new();
        buffers.open_at(&ItemPath::parse("index.js"), &tree).unwrap();
        buffers.open_at(&ItemPath::parse("src/a.js"), &tree).unwrap();
        buffers.open_at(&ItemPath::parse("src/sub/b.js"), &tree).unwrap();

        let mutation = TreeMutator::delete_folder(&tree, &mut buffers, "src", &root()).unwrap();

        assert!(buffers.get(&FileId::from("src/a.js")).is_none());
        assert!(buffers.get(&FileId::from("src/sub/b.js")).is_none());
        assert_eq!(buffers.active_id(), Some(&FileId::from("index.js")));
        assert!(mutation.snapshot.folder_at(&ItemPath::parse("src")).is_none());
        assert_eq!(mutation.changes, vec![FsChange::Remove { path: "src".to_string() }]);
    }

    #[test]
    fn test_delete_file_without_buffer() {
        let tree = project();
        let mut buffers = BufferManager::new();

        let mutation = TreeMutator::delete_file(&tree, &mut buffers, "a.js", &ItemPath::parse("src")).unwrap();

        assert_eq!(mutation.snapshot.file_count(), tree.file_count() - 1);
    }

    #[test]
    fn test_delete_missing_entity() {
        let tree = project();
        let mut buffers = BufferManager::new();
        assert_eq!(
            TreeMutator::delete_file(&tree, &mut buffers, "nope.js", &root()).unwrap_err(),
            TreeError::NotFound("nope.js".to_string())
        );
        // A folder is not deleted by delete_file
        assert!(TreeMutator::delete_file(&tree, &mut buffers, "src", &root()).is_err());
        assert!(matches!(
            TreeMutator::delete_folder(&tree, &mut buffers, "src", &ItemPath::parse("gone")),
            Err(TreeError::ParentNotFound(_))
        ));
    }

    #[test]
    fn test_rename_dirty_file_keeps_buffer_state() {
        let tree = TemplateFolder::new("root").with_item(TemplateFile::new("index", "js", "a"));
        let mut buffers = BufferManager::new();
        let old = buffers.open_at(&ItemPath::parse("index.js"), &tree).unwrap().id.clone();
        buffers.update_content(&old, "ab").unwrap();

        let mutation = TreeMutator::rename_file(&tree, &mut buffers, "index.js", "main", "js", &root()).unwrap();

        let new = FileId::from("main.js");
        let buffer = buffers.get(&new).unwrap();
        assert_eq!(buffer.content, "ab");
        assert!(buffer.has_unsaved_changes());
        assert_eq!(buffers.active_id(), Some(&new));
        assert_eq!(mutation.snapshot.items[0].name(), "main.js");
        assert_eq!(
            mutation.changes,
            vec![FsChange::Rename {
                from: "index.js".to_string(),
                to: "main.js".to_string()
            }]
        );
    }

    #[test]
    fn test_rename_to_existing_name_fails() {
        let tree = project();
        let mut buffers = BufferManager::new();
        buffers.open_at(&ItemPath::parse("index.js"), &tree).unwrap();

        let result = TreeMutator::rename_file(&tree, &mut buffers, "index.js", "app", "js", &root());

        assert!(matches!(result, Err(TreeError::DuplicateName { .. })));
        assert!(buffers.get(&FileId::from("index.js")).is_some());
    }

    #[test]
    fn test_rename_to_same_name_is_noop() {
        let tree = project();
        let mut buffers = BufferManager::new();

        let mutation = TreeMutator::rename_file(&tree, &mut buffers, "app.js", "app", "js", &root()).unwrap();
        assert_eq!(mutation.snapshot, tree);
        assert!(mutation.changes.is_empty());

        let mutation = TreeMutator::rename_folder(&tree, &mut buffers, "src", "src", &root()).unwrap();
        assert_eq!(mutation.snapshot, tree);
    }

    #[test]
    fn test_rename_folder_rekeys_nested_buffers_in_place() {
        let tree = project();
        let mut buffers = BufferManager::new();
        buffers.open_at(&ItemPath::parse("src/sub/b.js"), &tree).unwrap();

        let mutation = TreeMutator::rename_folder(&tree, &mut buffers, "src", "lib", &root()).unwrap();

        assert_eq!(mutation.snapshot.items[2].name(), "lib");
        assert!(buffers.get(&FileId::from("lib/sub/b.js")).is_some());
        assert_eq!(buffers.active_id(), Some(&FileId::from("lib/sub/b.js")));
    }

    #[test]
    fn test_update_file_content() {
        let tree = project();
        let next = TreeMutator::update_file_content(&tree, &ItemPath::parse("src/sub/b.js"), "22").unwrap();
        assert_eq!(next.file_at(&ItemPath::parse("src/sub/b.js")).unwrap().content, "22");
        assert_eq!(tree.file_at(&ItemPath::parse("src/sub/b.js")).unwrap().content, "2");

        assert_eq!(
            TreeMutator::update_file_content(&tree, &ItemPath::parse("src/missing.js"), "").unwrap_err(),
            TreeError::PathNotFound("src/missing.js".to_string())
        );
    }
}

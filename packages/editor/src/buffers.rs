// ABOUTME: Open editor buffers with dirty tracking and a single active buffer
// ABOUTME: Pure state transitions keyed by positional file ids; no I/O happens here

use playground_core::{derive_id, language_for_extension, FileId, ItemPath, TemplateFile, TemplateFolder, TreeError, TreeResult};
use serde::Serialize;

/// One file opened in the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBuffer {
    pub id: FileId,
    pub filename: String,
    pub file_extension: String,
    /// Live content, updated on every edit
    pub content: String,
    /// Last content known to be persisted
    original_content: String,
}

impl OpenBuffer {
    fn new(id: FileId, file: &TemplateFile) -> Self {
        Self {
            id,
            filename: file.filename.clone(),
            file_extension: file.file_extension.clone(),
            content: file.content.clone(),
            original_content: file.content.clone(),
        }
    }

    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.content != self.original_content
    }

    /// Language the editor surface should highlight this buffer as
    pub fn language_hint(&self) -> &'static str {
        language_for_extension(&self.file_extension)
    }

    pub fn display_name(&self) -> String {
        if self.file_extension.is_empty() {
            self.filename.clone()
        } else {
            format!("{}.{}", self.filename, self.file_extension)
        }
    }
}

/// Set of open buffers in the order they were opened
#[derive(Debug, Default, Clone)]
pub struct BufferManager {
    buffers: Vec<OpenBuffer>,
    active: Option<FileId>,
}

impl BufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `file` as positioned in `snapshot`.
    ///
    /// Reopening an already open file only makes it active; its live content,
    /// including unsaved edits, is left alone.
    pub fn open(&mut self, file: &TemplateFile, snapshot: &TemplateFolder) -> TreeResult<&OpenBuffer> {
        let id = derive_id(file, snapshot)?;
        let index = match self.position(&id) {
            Some(index) => index,
            None => {
                self.buffers.push(OpenBuffer::new(id.clone(), file));
                self.buffers.len() - 1
            }
        };
        self.active = Some(id);
        Ok(&self.buffers[index])
    }

    /// Open the file at `path`
    pub fn open_at(&mut self, path: &ItemPath, snapshot: &TemplateFolder) -> TreeResult<&OpenBuffer> {
        let file = snapshot
            .file_at(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        self.open(file, snapshot)
    }

    /// Close a buffer. Returns false if it was not open.
    pub fn close(&mut self, id: &FileId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.buffers.remove(index);
                self.reselect_active();
                true
            }
            None => false,
        }
    }

    /// Close every buffer at or beneath `folder`, returning how many were closed
    pub fn close_prefix(&mut self, folder: &ItemPath) -> usize {
        let before = self.buffers.len();
        self.buffers.retain(|buffer| !buffer.id.is_within(folder));
        self.reselect_active();
        before - self.buffers.len()
    }

    /// Drop all buffers, unsaved or not
    pub fn close_all(&mut self) {
        self.buffers.clear();
        self.active = None;
    }

    pub fn update_content(&mut self, id: &FileId, content: impl Into<String>) -> TreeResult<()> {
        self.get_mut(id)?.content = content.into();
        Ok(())
    }

    /// Record `persisted` as the saved content. Edits made after it was
    /// captured keep the buffer dirty.
    pub fn mark_saved(&mut self, id: &FileId, persisted: impl Into<String>) -> TreeResult<()> {
        self.get_mut(id)?.original_content = persisted.into();
        Ok(())
    }

    /// Move a buffer to the id of its renamed file. Returns false if it was not open.
    pub fn rekey(&mut self, old: &FileId, new: FileId, filename: &str, file_extension: &str) -> bool {
        let Some(index) = self.position(old) else {
            return false;
        };
        let buffer = &mut self.buffers[index];
        buffer.id = new.clone();
        buffer.filename = filename.to_string();
        buffer.file_extension = file_extension.to_string();
        if self.active.as_ref() == Some(old) {
            self.active = Some(new);
        }
        true
    }

    /// Re-key every buffer beneath a renamed folder
    pub fn rekey_prefix(&mut self, old_folder: &ItemPath, new_folder: &ItemPath) -> usize {
        let mut moved = 0;
        for buffer in &mut self.buffers {
            let Some(path) = buffer.id.to_path().rebase(old_folder, new_folder) else {
                continue;
            };
            let new_id = FileId::from_path(&path);
            if self.active.as_ref() == Some(&buffer.id) {
                self.active = Some(new_id.clone());
            }
            buffer.id = new_id;
            moved += 1;
        }
        moved
    }

    pub fn get(&self, id: &FileId) -> Option<&OpenBuffer> {
        self.buffers.iter().find(|buffer| &buffer.id == id)
    }

    pub fn active(&self) -> Option<&OpenBuffer> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<&FileId> {
        self.active.as_ref()
    }

    pub fn set_active(&mut self, id: &FileId) -> TreeResult<()> {
        if self.position(id).is_none() {
            return Err(TreeError::NotFound(id.to_string()));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffers in open order
    pub fn iter(&self) -> impl Iterator<Item = &OpenBuffer> {
        self.buffers.iter()
    }

    pub fn dirty_ids(&self) -> Vec<FileId> {
        self.buffers
            .iter()
            .filter(|buffer| buffer.has_unsaved_changes())
            .map(|buffer| buffer.id.clone())
            .collect()
    }

    fn position(&self, id: &FileId) -> Option<usize> {
        self.buffers.iter().position(|buffer| &buffer.id == id)
    }

    fn get_mut(&mut self, id: &FileId) -> TreeResult<&mut OpenBuffer> {
        self.buffers
            .iter_mut()
            .find(|buffer| &buffer.id == id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))
    }

    /// Keep the active buffer if it survived, otherwise fall back to the most recently opened one
    fn reselect_active(&mut self) {
        let still_open = self.active.as_ref().is_some_and(|id| self.position(id).is_some());
        if !still_open {
            self.active = self.buffers.last().map(|buffer| buffer.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot() -> TemplateFolder {
        TemplateFolder::new("root")
            .with_item(TemplateFile::new("index", "js", "a"))
            .with_item(TemplateFile::new("README", "md", "# hi"))
            .with_item(
                TemplateFolder::new("src")
                    .with_item(TemplateFile::new("a", "ts", "export {}"))
                    .with_item(TemplateFolder::new("sub").with_item(TemplateFile::new("b", "ts", ""))),
            )
    }

    fn open(buffers: &mut BufferManager, tree: &TemplateFolder, path: &str) -> FileId {
        buffers.open_at(&ItemPath::parse(path), tree).unwrap().id.clone()
    }

    #[test]
    fn test_open_twice_keeps_one_buffer_and_edits() {
        let tree = snapshot();
        let mut buffers = BufferManager::new();

        let id = open(&mut buffers, &tree, "index.js");
        buffers.update_content(&id, "ab").unwrap();
        let reopened = buffers.open_at(&ItemPath::parse("index.js"), &tree).unwrap();

        assert_eq!(reopened.content, "ab");
        assert!(reopened.has_unsaved_changes());
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers.active_id(), Some(&id));
    }

    #[test]
    fn test_reopen_after_refetch_recognizes_buffer() {
        let mut buffers = BufferManager::new();
        let first = snapshot();
        open(&mut buffers, &first, "src/a.ts");

        // Equal tree fetched again: same logical file, different allocation
        let refetched = snapshot();
        open(&mut buffers, &refetched, "src/a.ts");

        assert_eq!(buffers.len(), 1);
    }

    #[test]
    fn test_open_missing_path() {
        let mut buffers = BufferManager::new();
        let result = buffers.open_at(&ItemPath::parse("nope.js"), &snapshot());
        assert_eq!(result.unwrap_err(), TreeError::NotFound("nope.js".to_string()));
        assert!(buffers.is_empty());
    }

    #[test]
    fn test_close_active_falls_back_to_most_recent() {
        let tree = snapshot();
        let mut buffers = BufferManager::new();
        let index = open(&mut buffers, &tree, "index.js");
        let readme = open(&mut buffers, &tree, "README.md");
        let a = open(&mut buffers, &tree, "src/a.ts");

        buffers.set_active(&index).unwrap();
        assert!(buffers.close(&index));
        assert_eq!(buffers.active_id(), Some(&a));

        // Closing a non-active buffer leaves the active one alone
        assert!(buffers.close(&readme));
        assert_eq!(buffers.active_id(), Some(&a));

        assert!(buffers.close(&a));
        assert_eq!(buffers.active_id(), None);
        assert!(!buffers.close(&a));
    }

    #[test]
    fn test_close_all_discards_unsaved() {
        let tree = snapshot();
        let mut buffers = BufferManager::new();
        let id = open(&mut buffers, &tree, "index.js");
        buffers.update_content(&id, "changed").unwrap();

        buffers.close_all();

        assert!(buffers.is_empty());
        assert!(buffers.active().is_none());
    }

    #[test]
    fn test_mark_saved_with_captured_content() {
        let tree = snapshot();
        let mut buffers = BufferManager::new();
        let id = open(&mut buffers, &tree, "index.js");

        buffers.update_content(&id, "ab").unwrap();
        let captured = buffers.get(&id).unwrap().content.clone();
        // Keystroke lands while the save is in flight
        buffers.update_content(&id, "abc").unwrap();
        buffers.mark_saved(&id, captured).unwrap();

        let buffer = buffers.get(&id).unwrap();
        assert_eq!(buffer.original_content(), "ab");
        assert!(buffer.has_unsaved_changes());
        assert_eq!(buffers.dirty_ids(), vec![id.clone()]);

        buffers.mark_saved(&id, "abc").unwrap();
        assert!(buffers.dirty_ids().is_empty());
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut buffers = BufferManager::new();
        let ghost = FileId::from("ghost.js");
        assert!(buffers.update_content(&ghost, "x").is_err());
        assert!(buffers.mark_saved(&ghost, "x").is_err());
        assert!(buffers.set_active(&ghost).is_err());
    }

    #[test]
    fn test_rekey_preserves_state_and_active() {
        let tree = snapshot();
        let mut buffers = BufferManager::new();
        let old = open(&mut buffers, &tree, "index.js");
        buffers.update_content(&old, "ab").unwrap();

        let new = FileId::from("main.js");
        assert!(buffers.rekey(&old, new.clone(), "main", "js"));

        let buffer = buffers.get(&new).unwrap();
        assert_eq!(buffer.content, "ab");
        assert_eq!(buffer.original_content(), "a");
        assert_eq!(buffer.display_name(), "main.js");
        assert_eq!(buffers.active_id(), Some(&new));
        assert!(buffers.get(&old).is_none());
    }

    #[test]
    fn test_prefix_operations() {
        let tree = snapshot();
        let mut buffers = BufferManager::new();
        open(&mut buffers, &tree, "index.js");
        open(&mut buffers, &tree, "src/a.ts");
        open(&mut buffers, &tree, "src/sub/b.ts");

        let moved = buffers.rekey_prefix(&ItemPath::parse("src"), &ItemPath::parse("lib"));
        assert_eq!(moved, 2);
        assert_eq!(buffers.active_id(), Some(&FileId::from("lib/sub/b.ts")));

        let closed = buffers.close_prefix(&ItemPath::parse("lib"));
        assert_eq!(closed, 2);
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers.active_id(), Some(&FileId::from("index.js")));
    }

    #[test]
    fn test_language_hint_follows_extension() {
        let tree = snapshot();
        let mut buffers = BufferManager::new();
        let buffer = buffers.open_at(&ItemPath::parse("src/a.ts"), &tree).unwrap();
        assert_eq!(buffer.language_hint(), "typescript");
    }
}

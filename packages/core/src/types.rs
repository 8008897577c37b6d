// ABOUTME: Recursive file/folder tree that makes up a project snapshot
// ABOUTME: Serializes to the folderName/items + filename/fileExtension/content record format

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ptr;

use crate::error::{TreeError, TreeResult};
use crate::path::ItemPath;

/// Leaf entity: one text file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFile {
    /// Name without extension
    pub filename: String,
    /// Extension without the leading dot; empty for files like `Dockerfile`
    #[serde(default)]
    pub file_extension: String,
    #[serde(default)]
    pub content: String,
}

impl TemplateFile {
    pub fn new(
        filename: impl Into<String>,
        file_extension: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            file_extension: file_extension.into(),
            content: content.into(),
        }
    }

    /// Build a file from a full name such as `index.js`, splitting on the last dot.
    /// Dotfiles like `.gitignore` keep the whole name and get no extension.
    pub fn from_name(name: &str, content: impl Into<String>) -> Self {
        match name.rfind('.') {
            Some(idx) if idx > 0 => Self::new(&name[..idx], &name[idx + 1..], content),
            _ => Self::new(name, "", content),
        }
    }

    /// Name as it appears on disk, `filename.extension`
    pub fn display_name(&self) -> Cow<'_, str> {
        if self.file_extension.is_empty() {
            Cow::Borrowed(&self.filename)
        } else {
            Cow::Owned(format!("{}.{}", self.filename, self.file_extension))
        }
    }
}

/// Composite entity: a named, ordered list of files and folders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFolder {
    pub folder_name: String,
    #[serde(default)]
    pub items: Vec<TemplateItem>,
}

/// Either kind of tree entity. Untagged on the wire: files are recognised by
/// their `filename` field, folders by `folderName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateItem {
    File(TemplateFile),
    Folder(TemplateFolder),
}

impl TemplateItem {
    /// Display name used for paths and sibling collision checks
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            TemplateItem::File(file) => file.display_name(),
            TemplateItem::Folder(folder) => Cow::Borrowed(&folder.folder_name),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, TemplateItem::File(_))
    }

    pub fn as_file(&self) -> Option<&TemplateFile> {
        match self {
            TemplateItem::File(file) => Some(file),
            TemplateItem::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&TemplateFolder> {
        match self {
            TemplateItem::Folder(folder) => Some(folder),
            TemplateItem::File(_) => None,
        }
    }
}

impl From<TemplateFile> for TemplateItem {
    fn from(file: TemplateFile) -> Self {
        TemplateItem::File(file)
    }
}

impl From<TemplateFolder> for TemplateItem {
    fn from(folder: TemplateFolder) -> Self {
        TemplateItem::Folder(folder)
    }
}

/// Borrowed handle to an entity whose position should be resolved
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    File(&'a TemplateFile),
    Folder(&'a TemplateFolder),
}

impl<'a> From<&'a TemplateFile> for EntityRef<'a> {
    fn from(file: &'a TemplateFile) -> Self {
        EntityRef::File(file)
    }
}

impl<'a> From<&'a TemplateFolder> for EntityRef<'a> {
    fn from(folder: &'a TemplateFolder) -> Self {
        EntityRef::Folder(folder)
    }
}

impl<'a> From<&'a TemplateItem> for EntityRef<'a> {
    fn from(item: &'a TemplateItem) -> Self {
        match item {
            TemplateItem::File(file) => EntityRef::File(file),
            TemplateItem::Folder(folder) => EntityRef::Folder(folder),
        }
    }
}

impl EntityRef<'_> {
    fn describe(&self) -> String {
        match self {
            EntityRef::File(file) => file.display_name().into_owned(),
            EntityRef::Folder(folder) => folder.folder_name.clone(),
        }
    }
}

#[derive(Default)]
struct Matches {
    by_reference: Option<ItemPath>,
    structural: Vec<ItemPath>,
}

impl TemplateFolder {
    pub fn new(folder_name: impl Into<String>) -> Self {
        Self {
            folder_name: folder_name.into(),
            items: Vec::new(),
        }
    }

    /// Builder-style append, mostly for constructing templates and fixtures
    pub fn with_item(mut self, item: impl Into<TemplateItem>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Direct child by display name
    pub fn child(&self, name: &str) -> Option<&TemplateItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name() == name)
    }

    /// Folder at `path`; the empty path is `self`
    pub fn folder_at(&self, path: &ItemPath) -> Option<&TemplateFolder> {
        let mut current = self;
        for segment in path.segments() {
            match current.child(segment) {
                Some(TemplateItem::Folder(folder)) => current = folder,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn folder_at_mut(&mut self, path: &ItemPath) -> Option<&mut TemplateFolder> {
        let mut current = self;
        for segment in path.segments() {
            let idx = current.child_index(segment)?;
            current = match &mut current.items[idx] {
                TemplateItem::Folder(folder) => folder,
                TemplateItem::File(_) => return None,
            };
        }
        Some(current)
    }

    /// Item at `path`. The root is not an item, so the empty path yields `None`.
    pub fn item_at(&self, path: &ItemPath) -> Option<&TemplateItem> {
        let name = path.name()?;
        self.folder_at(&path.parent()?)?.child(name)
    }

    pub fn file_at(&self, path: &ItemPath) -> Option<&TemplateFile> {
        self.item_at(path).and_then(TemplateItem::as_file)
    }

    /// Every file reachable from this folder, depth-first in item order
    pub fn files(&self) -> Vec<(ItemPath, &TemplateFile)> {
        let mut files = Vec::new();
        self.collect_files(&ItemPath::root(), &mut files);
        files
    }

    fn collect_files<'a>(&'a self, base: &ItemPath, out: &mut Vec<(ItemPath, &'a TemplateFile)>) {
        for item in &self.items {
            match item {
                TemplateItem::File(file) => out.push((base.join(file.display_name()), file)),
                TemplateItem::Folder(folder) => {
                    folder.collect_files(&base.join(folder.folder_name.as_str()), out)
                }
            }
        }
    }

    /// Every descendant folder path, parents before children
    pub fn folders(&self) -> Vec<ItemPath> {
        let mut folders = Vec::new();
        self.collect_folders(&ItemPath::root(), &mut folders);
        folders
    }

    fn collect_folders(&self, base: &ItemPath, out: &mut Vec<ItemPath>) {
        for folder in self.items.iter().filter_map(TemplateItem::as_folder) {
            let path = base.join(folder.folder_name.as_str());
            out.push(path.clone());
            folder.collect_folders(&path, out);
        }
    }

    pub fn file_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                TemplateItem::File(_) => 1,
                TemplateItem::Folder(folder) => folder.file_count(),
            })
            .sum()
    }

    /// Resolve the position of `entity` within this snapshot.
    ///
    /// An entity borrowed from this very snapshot is matched by reference, which
    /// is exact even when identical files live in different folders. An entity
    /// from another (equal) snapshot falls back to structural equality and must
    /// match exactly one node; zero or several candidates yield `NotFound`.
    pub fn resolve_path<'a>(&self, entity: impl Into<EntityRef<'a>>) -> TreeResult<ItemPath> {
        let entity = entity.into();

        if let EntityRef::Folder(folder) = entity {
            if ptr::eq(folder, self) {
                return Ok(ItemPath::root());
            }
        }

        let mut matches = Matches::default();
        if let EntityRef::Folder(folder) = entity {
            if folder == self {
                matches.structural.push(ItemPath::root());
            }
        }
        self.find_matches(&ItemPath::root(), entity, &mut matches);

        if let Some(path) = matches.by_reference {
            return Ok(path);
        }
        if matches.structural.len() == 1 {
            if let Some(path) = matches.structural.pop() {
                return Ok(path);
            }
        }
        Err(TreeError::NotFound(entity.describe()))
    }

    fn find_matches(&self, base: &ItemPath, target: EntityRef<'_>, matches: &mut Matches) {
        for item in &self.items {
            match (item, target) {
                (TemplateItem::File(file), EntityRef::File(wanted)) => {
                    let path = base.join(file.display_name());
                    if ptr::eq(file, wanted) {
                        matches.by_reference = Some(path);
                        return;
                    }
                    if file == wanted {
                        matches.structural.push(path);
                    }
                }
                (TemplateItem::File(_), EntityRef::Folder(_)) => {}
                (TemplateItem::Folder(folder), _) => {
                    let path = base.join(folder.folder_name.as_str());
                    if let EntityRef::Folder(wanted) = target {
                        if ptr::eq(folder, wanted) {
                            matches.by_reference = Some(path);
                            return;
                        }
                        if folder == wanted {
                            matches.structural.push(path.clone());
                        }
                    }
                    folder.find_matches(&path, target, matches);
                    if matches.by_reference.is_some() {
                        return;
                    }
                }
            }
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TreeResult;
use crate::path::ItemPath;
use crate::types::{EntityRef, TemplateFolder};

/// Stable identifier of a file or folder, derived from its position.
///
/// The persisted tree carries no ids, so an id is simply the rendered item
/// path (`src/utils/index.js`). It stays valid for as long as the entity does
/// not move; after a rename or move the caller has to re-derive it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn from_path(path: &ItemPath) -> Self {
        Self(path.to_string())
    }

    pub fn to_path(&self) -> ItemPath {
        ItemPath::parse(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this id names `folder` itself or something beneath it
    pub fn is_within(&self, folder: &ItemPath) -> bool {
        self.to_path().starts_with(folder)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self::from_path(&ItemPath::parse(id))
    }
}

/// Derive the id of `entity` as positioned in `snapshot`
pub fn derive_id<'a>(entity: impl Into<EntityRef<'a>>, snapshot: &TemplateFolder) -> TreeResult<FileId> {
    snapshot.resolve_path(entity).map(|path| FileId::from_path(&path))
}

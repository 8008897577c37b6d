use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an item inside a snapshot, as display names from the root down.
///
/// The root folder itself is not part of the path, so the root's path is empty
/// and a top-level `package.json` has the single segment `package.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemPath(Vec<String>);

impl ItemPath {
    /// Path of the root folder
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a `/`-separated path. Empty segments (leading, trailing or doubled
    /// slashes) are ignored, so `""`, `"/"` and `"./"` all denote the root.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|segment| !segment.is_empty() && *segment != ".")
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<ItemPath> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn join(&self, name: impl Into<String>) -> ItemPath {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// True when `self` is `ancestor` or lies somewhere beneath it
    pub fn starts_with(&self, ancestor: &ItemPath) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    /// Replace the `from` prefix with `to`. Returns `None` if `from` is not a prefix.
    pub fn rebase(&self, from: &ItemPath, to: &ItemPath) -> Option<ItemPath> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments = to.0.clone();
        segments.extend_from_slice(&self.0[from.0.len()..]);
        Some(Self(segments))
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for ItemPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_empty_segments() {
        assert_eq!(ItemPath::parse("/src//utils/"), ItemPath::from_segments(["src", "utils"]));
        assert!(ItemPath::parse("").is_root());
        assert!(ItemPath::parse("/").is_root());
        assert!(ItemPath::parse("./").is_root());
    }

    #[test]
    fn test_display_has_no_leading_slash() {
        let path = ItemPath::from_segments(["src", "index.js"]);
        assert_eq!(path.to_string(), "src/index.js");
        assert_eq!(ItemPath::root().to_string(), "");
    }

    #[test]
    fn test_parent_and_name() {
        let path = ItemPath::parse("src/sub/b.js");
        assert_eq!(path.name(), Some("b.js"));
        assert_eq!(path.parent(), Some(ItemPath::parse("src/sub")));
        assert_eq!(ItemPath::root().parent(), None);
    }

    #[test]
    fn test_rebase() {
        let path = ItemPath::parse("src/sub/b.js");
        let moved = path.rebase(&ItemPath::parse("src"), &ItemPath::parse("lib"));
        assert_eq!(moved, Some(ItemPath::parse("lib/sub/b.js")));
        assert_eq!(path.rebase(&ItemPath::parse("test"), &ItemPath::parse("lib")), None);
    }

    #[test]
    fn test_starts_with_is_segment_based() {
        let path = ItemPath::parse("srcs/a.js");
        assert!(!path.starts_with(&ItemPath::parse("src")));
        assert!(path.starts_with(&ItemPath::parse("srcs")));
    }
}

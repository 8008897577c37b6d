// ABOUTME: Core tree types, positional identity and path helpers for Playground
// ABOUTME: Foundational package shared by storage, sandboxes and the editor session

pub mod error;
pub mod identity;
pub mod language;
pub mod path;
pub mod scan;
pub mod types;
pub mod validation;

// Re-export main types
pub use error::{TreeError, TreeResult};
pub use identity::{derive_id, FileId};
pub use path::ItemPath;
pub use types::{EntityRef, TemplateFile, TemplateFolder, TemplateItem};

// Re-export utilities
pub use language::{language_for_extension, PLAINTEXT};
pub use scan::scan_directory;
pub use validation::{validate_file_name, validate_name};

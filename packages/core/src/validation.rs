use crate::error::{TreeError, TreeResult};

const MAX_NAME_LENGTH: usize = 255;

fn invalid(name: &str, reason: &str) -> TreeError {
    TreeError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate a single path segment (folder name or full file name).
///
/// Names end up as sandbox paths, so separators and traversal segments are
/// rejected outright.
pub fn validate_name(name: &str) -> TreeResult<()> {
    if name.trim().is_empty() {
        return Err(invalid(name, "name cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid(name, "name cannot be a relative path segment"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid(name, "name cannot contain path separators"));
    }
    if name.chars().any(|c| c == '\0' || c.is_control()) {
        return Err(invalid(name, "name cannot contain control characters"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(invalid(name, "name is too long"));
    }
    Ok(())
}

/// Validate a file's base name and extension separately
pub fn validate_file_name(filename: &str, extension: &str) -> TreeResult<()> {
    validate_name(filename)?;
    if extension.contains('/') || extension.contains('\\') || extension.starts_with('.') {
        return Err(invalid(extension, "extension must not contain separators or a leading dot"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_names() {
        assert!(validate_name("src").is_ok());
        assert!(validate_name(".gitignore").is_ok());
        assert!(validate_file_name("index", "js").is_ok());
        assert!(validate_file_name("Dockerfile", "").is_ok());
    }

    #[test]
    fn test_rejects_traversal_and_separators() {
        for name in ["", "   ", ".", "..", "a/b", "a\\b", "bad\0name"] {
            assert!(validate_name(name).is_err(), "expected '{}' to be rejected", name);
        }
        assert!(validate_file_name("index", "/js").is_err());
        assert!(validate_file_name("index", ".js").is_err());
    }
}

// ABOUTME: Fixed lookup table from file extension to editor language mode
// ABOUTME: The editor surface receives this hint alongside the buffer content

/// Language hint used when nothing more specific is known
pub const PLAINTEXT: &str = "plaintext";

/// Map a file extension (without the dot, any case) to an editor language id
pub fn language_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "json" => "json",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "less" => "less",
        "md" | "markdown" => "markdown",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "rb" => "ruby",
        "php" => "php",
        "sh" | "bash" => "shell",
        "yml" | "yaml" => "yaml",
        "xml" | "svg" => "xml",
        "sql" => "sql",
        "vue" => "html",
        _ => PLAINTEXT,
    }
}

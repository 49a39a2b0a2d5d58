//! Best-effort detection of comment-only lines. Stripping is a quality
//! feature, not a correctness one: unknown languages pass through
//! unchanged, and block comments are only recognized when a line is
//! self-contained.

/// Line-comment prefixes for the languages the scanner can guess.
fn line_comment_prefixes(language: &str) -> &'static [&'static str] {
    match language {
        "rust" | "go" | "javascript" | "typescript" | "tsx" | "jsx" | "c" | "cpp" | "csharp"
        | "java" | "kotlin" | "scala" | "swift" | "dart" | "zig" | "php" => &["//"],
        "python" | "ruby" | "shell" | "yaml" | "toml" | "r" | "julia" | "elixir" => &["#"],
        "sql" | "lua" | "haskell" => &["--"],
        _ => &[],
    }
}

/// True if the line holds nothing but a comment. Blank lines are not
/// comments.
pub fn is_comment_line(line: &str, language: &str) -> bool {
    let trimmed = line.trim_start();
    if line_comment_prefixes(language)
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
    {
        return true;
    }
    // Self-contained C-style block comment lines (`/* ... */`).
    if matches!(
        language,
        "rust" | "javascript" | "typescript" | "tsx" | "jsx" | "c" | "cpp" | "csharp" | "java"
    ) {
        let trimmed = trimmed.trim_end();
        if trimmed.starts_with("/*") && trimmed.ends_with("*/") {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_line_comment() {
        assert!(is_comment_line("// a comment", "rust"));
        assert!(is_comment_line("    /// doc comment", "rust"));
        assert!(!is_comment_line("let x = 1; // trailing", "rust"));
    }

    #[test]
    fn test_python_hash_comment() {
        assert!(is_comment_line("# setup", "python"));
        assert!(!is_comment_line("x = 1", "python"));
    }

    #[test]
    fn test_block_comment_single_line() {
        assert!(is_comment_line("/* licensed */", "c"));
        assert!(!is_comment_line("/* opens only", "c"));
    }

    #[test]
    fn test_unknown_language_never_matches() {
        assert!(!is_comment_line("// looks like a comment", "cobol"));
        assert!(!is_comment_line("# also", "cobol"));
    }

    #[test]
    fn test_blank_line_is_not_a_comment() {
        assert!(!is_comment_line("", "rust"));
        assert!(!is_comment_line("   ", "python"));
    }
}

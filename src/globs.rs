use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compile a list of glob patterns into a matcher. An empty list
/// compiles to a set that matches nothing.
pub fn build(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = build(&[]).unwrap();
        assert!(!set.is_match("src/main.rs"));
    }

    #[test]
    fn test_recursive_glob() {
        let set = build(&["**/*.rs".to_string()]).unwrap();
        assert!(set.is_match("src/deeply/nested/mod.rs"));
        assert!(!set.is_match("README.md"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(build(&["src/[".to_string()]).is_err());
    }
}

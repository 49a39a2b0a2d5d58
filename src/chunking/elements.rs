//! Lightweight symbol extraction via tree-sitter.
//!
//! Chunks are fragments, so parses are expected to contain error nodes;
//! extraction collects whatever declarations parse cleanly and ignores
//! the rest. Unsupported languages yield empty elements.

use crate::models::ExtractedElements;

/// Languages with tree-sitter grammar support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Grammar {
    fn from_language(language: &str) -> Option<Self> {
        match language {
            "rust" => Some(Grammar::Rust),
            "javascript" | "jsx" => Some(Grammar::JavaScript),
            "typescript" => Some(Grammar::TypeScript),
            "tsx" => Some(Grammar::Tsx),
            _ => None,
        }
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Extract function, class-like, and variable names from a chunk's text.
pub fn extract(content: &str, language: &str) -> ExtractedElements {
    let Some(grammar) = Grammar::from_language(language) else {
        return ExtractedElements::default();
    };

    let mut parser = tree_sitter::Parser::new();
    if parser
        .set_language(&grammar.tree_sitter_language())
        .is_err()
    {
        return ExtractedElements::default();
    }
    let Some(tree) = parser.parse(content, None) else {
        return ExtractedElements::default();
    };

    let mut elements = ExtractedElements::default();
    collect(tree.root_node(), content.as_bytes(), &mut elements);

    for list in [
        &mut elements.functions,
        &mut elements.classes,
        &mut elements.variables,
    ] {
        list.sort();
        list.dedup();
    }
    elements
}

fn collect(node: tree_sitter::Node, src: &[u8], out: &mut ExtractedElements) {
    match node.kind() {
        // Functions and methods
        "function_item"
        | "function_declaration"
        | "function_signature"
        | "generator_function_declaration"
        | "method_definition" => {
            push_named(node, "name", src, &mut out.functions);
        }
        // Class-like declarations
        "struct_item" | "enum_item" | "trait_item" | "union_item" | "class_declaration"
        | "interface_declaration" | "enum_declaration" | "type_alias_declaration" => {
            push_named(node, "name", src, &mut out.classes);
        }
        // Variables and constants
        "const_item" | "static_item" => {
            push_named(node, "name", src, &mut out.variables);
        }
        "let_declaration" => {
            push_named(node, "pattern", src, &mut out.variables);
        }
        "variable_declarator" | "public_field_definition" => {
            push_named(node, "name", src, &mut out.variables);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, src, out);
    }
}

fn push_named(node: tree_sitter::Node, field: &str, src: &[u8], into: &mut Vec<String>) {
    if let Some(name) = node.child_by_field_name(field) {
        if let Ok(text) = name.utf8_text(src) {
            let text = text.trim();
            if !text.is_empty() {
                into.push(text.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_rust_symbols() {
        let source = r#"
const MAX_RETRIES: usize = 3;

struct Connection {
    url: String,
}

impl Connection {
    fn open(url: &str) -> Self {
        let parsed = url.to_string();
        Connection { url: parsed }
    }
}

fn main() {
    let conn = Connection::open("localhost");
}
"#;
        let elements = extract(source, "rust");
        assert!(elements.functions.contains(&"open".to_string()));
        assert!(elements.functions.contains(&"main".to_string()));
        assert!(elements.classes.contains(&"Connection".to_string()));
        assert!(elements.variables.contains(&"MAX_RETRIES".to_string()));
        assert!(elements.variables.contains(&"conn".to_string()));
    }

    #[test]
    fn test_extract_typescript_symbols() {
        let source = r#"
interface Config {
    name: string;
}

class Service {
    process(input: Config): string {
        return input.name;
    }
}

function helper() {
    const cached = 42;
    return cached;
}
"#;
        let elements = extract(source, "typescript");
        assert!(elements.classes.contains(&"Config".to_string()));
        assert!(elements.classes.contains(&"Service".to_string()));
        assert!(elements.functions.contains(&"helper".to_string()));
        assert!(elements.functions.contains(&"process".to_string()));
        assert!(elements.variables.contains(&"cached".to_string()));
    }

    #[test]
    fn test_extract_unknown_language_is_empty() {
        let elements = extract("def f():\n    pass\n", "cobol");
        assert!(elements.is_empty());
    }

    #[test]
    fn test_extract_tolerates_truncated_fragment() {
        // A window boundary can cut a declaration in half.
        let source = "fn complete() {}\n\nfn cut_off(a: u32, b:";
        let elements = extract(source, "rust");
        assert!(elements.functions.contains(&"complete".to_string()));
    }

    #[test]
    fn test_extract_deduplicates() {
        let source = "fn same() {}\nmod inner {\n    fn same() {}\n}\n";
        let elements = extract(source, "rust");
        assert_eq!(
            elements.functions.iter().filter(|f| *f == "same").count(),
            1
        );
    }
}

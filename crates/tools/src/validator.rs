//! Syntax validation for script writes.
//!
//! Writes to JavaScript/TypeScript files are parsed before they reach the
//! filesystem. The built-in `TreeSitterValidator` parses with the
//! tree-sitter grammars and reports the first error or missing node.

use async_trait::async_trait;
use tree_sitter::{Language, Node, Parser};

/// Extensions whose writes must pass validation.
pub const VALIDATED_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// External syntax checker. `Err` carries a human-readable problem.
#[async_trait]
pub trait SyntaxValidator: Send + Sync {
    async fn validate(&self, path: &str, content: &str) -> Result<(), String>;
}

/// Whether a write to `path` goes through the validator.
pub fn needs_validation(path: &str) -> bool {
    tessera_vfs::path::extension(path)
        .is_some_and(|ext| VALIDATED_EXTENSIONS.contains(&ext.as_str()))
}

/// Grammar for a validated extension. JSX files use the TSX grammar.
fn language_for(path: &str) -> Option<Language> {
    let ext = tessera_vfs::path::extension(path)?;
    let language = match ext.as_str() {
        "js" => tree_sitter_javascript::LANGUAGE.into(),
        "ts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "tsx" | "jsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => return None,
    };
    Some(language)
}

/// Parses with tree-sitter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterValidator;

/// Parse `content` with the grammar for `path`. Paths without a grammar
/// always pass.
pub fn check_syntax(path: &str, content: &str) -> Result<(), String> {
    let Some(language) = language_for(path) else {
        return Ok(());
    };

    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| format!("grammar unavailable: {e}"))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| "parser produced no tree".to_string())?;

    match first_problem(tree.root_node()) {
        Some(node) => Err(describe(node, content)),
        None => Ok(()),
    }
}

/// Pre-order walk that only descends into subtrees containing errors.
fn first_problem(root: Node<'_>) -> Option<Node<'_>> {
    if !root.has_error() {
        return None;
    }
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn describe(node: Node<'_>, content: &str) -> String {
    let line = node.start_position().row + 1;
    if node.is_missing() {
        return format!("missing '{}' at line {line}", node.kind());
    }

    let near: String = content
        .get(node.byte_range())
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .chars()
        .take(40)
        .collect();
    if near.is_empty() {
        format!("unexpected end of input at line {line}")
    } else {
        format!("unexpected '{near}' at line {line}")
    }
}

#[async_trait]
impl SyntaxValidator for TreeSitterValidator {
    async fn validate(&self, path: &str, content: &str) -> Result<(), String> {
        check_syntax(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_script_files_are_validated() {
        assert!(needs_validation("src/app.ts"));
        assert!(needs_validation("src/App.TSX"));
        assert!(needs_validation("index.js"));
        assert!(!needs_validation("index.html"));
        assert!(!needs_validation("main.py"));
        assert!(!needs_validation("Makefile"));
    }

    #[test]
    fn valid_code_passes() {
        let src = r#"
            // a comment with an unmatched ( paren
            function greet(name) {
                const msg = `Hello ${name.toUpperCase()} {`;
                const arr = [1, 2, { a: "}" }];
                /* block ] comment */
                return msg + arr.length + 'it\'s';
            }
        "#;
        assert_eq!(check_syntax("greet.js", src), Ok(()));
        assert_eq!(check_syntax("nested.ts", "const s = `a ${ `b ${ c } d` } e`;"), Ok(()));
    }

    #[test]
    fn jsx_text_with_apostrophe_passes() {
        let src = "export default function App() {\n  return (\n    <p>Don't panic</p>\n  );\n}\n";
        assert_eq!(check_syntax("src/App.jsx", src), Ok(()));
        assert_eq!(check_syntax("src/App.tsx", src), Ok(()));
        assert_eq!(check_syntax("src/App.js", src), Ok(()));
    }

    #[test]
    fn regex_literal_with_quote_passes() {
        let src = "export const clean = (s) => s.replace(/'/g, \"\");\n";
        assert_eq!(check_syntax("clean.js", src), Ok(()));
        let typed = "export const clean = (s: string): string => s.replace(/'/g, \"\");\n";
        assert_eq!(check_syntax("clean.ts", typed), Ok(()));
    }

    #[test]
    fn type_annotations_need_the_typescript_grammar() {
        let src = "interface User { name: string }\nexport const u: User = { name: 'a' };\n";
        assert_eq!(check_syntax("user.ts", src), Ok(()));
        assert!(check_syntax("user.js", src).is_err());
    }

    #[test]
    fn unclosed_function_is_reported() {
        let err = check_syntax("f.ts", "function f() {\n  return 1;\n").unwrap_err();
        assert!(err.contains("at line"), "{err}");
    }

    #[test]
    fn stray_closer_reports_its_line() {
        let err = check_syntax("x.js", "let x = 1;\n}\n").unwrap_err();
        assert!(err.contains("line 2"), "{err}");
    }

    #[test]
    fn unterminated_literals_fail() {
        assert!(check_syntax("s.js", "const s = \"abc;\nfoo()").is_err());
        assert!(check_syntax("t.js", "const s = `abc").is_err());
        assert!(check_syntax("c.js", "const a = 1; /* never closed").is_err());
    }

    #[test]
    fn other_extensions_pass_untouched() {
        assert_eq!(check_syntax("notes.md", "{{{ ("), Ok(()));
    }

    #[tokio::test]
    async fn validator_trait_delegates() {
        let v = TreeSitterValidator;
        assert!(v.validate("a.ts", "let a = {};").await.is_ok());
        assert!(v.validate("a.ts", "let a = {;").await.is_err());
    }
}

//! Pattern-based symbol extraction.
//!
//! Deliberately shallow: regular expressions over source text, no parsing.
//! Good enough to point an agent at the right file, never exhaustive.

use regex_lite::Regex;
use std::sync::LazyLock;

static JS_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\s*\*?\s+([A-Za-z_$][\w$]*)").unwrap());
static JS_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?(?:default\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)").unwrap()
});
static JS_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s+([A-Za-z_$][\w$]*)").unwrap());
static PY_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)").unwrap());
static PY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*class\s+([A-Za-z_]\w*)").unwrap());
static HTML_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

const SNIPPET_CHARS: usize = 300;
const SUMMARY_SYMBOLS: usize = 3;

/// Source families the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Html,
    Other,
}

impl Language {
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("js" | "jsx" | "mjs" | "cjs") => Self::JavaScript,
            Some("ts" | "tsx") => Self::TypeScript,
            Some("py") => Self::Python,
            Some("html" | "htm") => Self::Html,
            _ => Self::Other,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Python => "Python",
            Self::Html => "HTML",
            Self::Other => "",
        }
    }
}

/// Symbol labels (`function:NAME`, `class:NAME`, ...) in source order per
/// kind, deduplicated.
pub fn extract_symbols(lang: Language, content: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    let mut collect = |re: &Regex, kind: &str| {
        for caps in re.captures_iter(content) {
            if let Some(name) = caps.get(1) {
                let label = format!("{kind}:{}", name.as_str().trim());
                if !symbols.contains(&label) {
                    symbols.push(label);
                }
            }
        }
    };

    match lang {
        Language::JavaScript | Language::TypeScript => {
            collect(&JS_FUNCTION, "function");
            collect(&JS_VARIABLE, "variable");
            collect(&JS_CLASS, "class");
        }
        Language::Python => {
            collect(&PY_DEF, "function");
            collect(&PY_CLASS, "class");
        }
        Language::Html => collect(&HTML_TITLE, "title"),
        Language::Other => {}
    }
    symbols
}

/// One-line human summary of a file.
pub fn summarize(lang: Language, ext: Option<&str>, symbols: &[String]) -> String {
    match lang {
        Language::Html => match symbols.first().and_then(|s| s.strip_prefix("title:")) {
            Some(title) => format!("HTML page: {title}"),
            None => "HTML page".to_string(),
        },
        Language::Other => match ext {
            Some(ext) => format!("{ext} file"),
            None => "file".to_string(),
        },
        _ if symbols.is_empty() => format!("{} module", lang.display_name()),
        _ => {
            let names: Vec<&str> = symbols
                .iter()
                .take(SUMMARY_SYMBOLS)
                .map(|s| s.split_once(':').map_or(s.as_str(), |(_, n)| n))
                .collect();
            format!("{} module defining {}", lang.display_name(), names.join(", "))
        }
    }
}

/// Leading characters of a file with whitespace runs collapsed.
pub fn snippet(content: &str) -> String {
    let head: String = content.chars().take(SNIPPET_CHARS).collect();
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typescript_symbols() {
        let src = r#"
import React from "react";
export const API_URL = "/api";
let counter = 0;
export default function LoginForm() {
    const inner = 1;
    return null;
}
class AuthStore {}
"#;
        let symbols = extract_symbols(Language::TypeScript, src);
        assert_eq!(
            symbols,
            vec![
                "function:LoginForm",
                "variable:API_URL",
                "variable:counter",
                "class:AuthStore",
            ]
        );
    }

    #[test]
    fn python_symbols() {
        let src = "class User:\n    def save(self):\n        pass\n\nasync def fetch_all():\n    pass\n";
        let symbols = extract_symbols(Language::Python, src);
        assert_eq!(symbols, vec!["function:save", "function:fetch_all", "class:User"]);
    }

    #[test]
    fn html_title_and_summary() {
        let src = "<html><head><TITLE>Sign in</TITLE></head></html>";
        let symbols = extract_symbols(Language::Html, src);
        assert_eq!(symbols, vec!["title:Sign in"]);
        assert_eq!(summarize(Language::Html, Some("html"), &symbols), "HTML page: Sign in");
    }

    #[test]
    fn summary_lists_first_three() {
        let symbols: Vec<String> = ["function:a", "function:b", "class:C", "variable:d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            summarize(Language::JavaScript, Some("js"), &symbols),
            "JavaScript module defining a, b, C"
        );
        assert_eq!(summarize(Language::Other, Some("css"), &[]), "css file");
    }

    #[test]
    fn snippet_collapses_whitespace() {
        assert_eq!(snippet("a  \n\t b\n\nc"), "a b c");
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).len(), 300);
    }
}

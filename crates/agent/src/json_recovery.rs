//! Recovery of JSON values embedded in free model text.
//!
//! Models asked for JSON often wrap it in prose or code fences, emit
//! several documents, truncate the last one or put raw newlines inside
//! string literals. The scanner tracks bracket depth outside strings and
//! tries to parse every top-level balanced span it finds.

use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Default)]
struct Scanner {
    stack: Vec<char>,
    in_string: bool,
    escaped: bool,
    start: Option<usize>,
}

impl Scanner {
    fn reset(&mut self) {
        self.stack.clear();
        self.in_string = false;
        self.escaped = false;
        self.start = None;
    }
}

/// Every JSON object or array found in `text`, in the order their closing
/// brackets appear. Fragments that cannot be parsed are skipped.
pub fn recover_json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut s = Scanner::default();

    for (i, c) in text.char_indices() {
        if s.in_string {
            if s.escaped {
                s.escaped = false;
            } else if c == '\\' {
                s.escaped = true;
            } else if c == '"' {
                s.in_string = false;
            }
            continue;
        }

        match c {
            '"' if !s.stack.is_empty() => s.in_string = true,
            '{' | '[' => {
                if s.stack.is_empty() {
                    s.start = Some(i);
                }
                s.stack.push(c);
            }
            '}' | ']' => {
                let Some(&open) = s.stack.last() else {
                    continue;
                };
                let matches = (open == '{' && c == '}') || (open == '[' && c == ']');
                if !matches {
                    s.reset();
                    continue;
                }
                s.stack.pop();
                if s.stack.is_empty()
                    && let Some(start) = s.start.take()
                {
                    let candidate = &text[start..=i];
                    match parse_candidate(candidate) {
                        Some(v) => values.push(v),
                        None => debug!(len = candidate.len(), "Discarding unparseable JSON fragment"),
                    }
                }
            }
            _ => {}
        }
    }

    values
}

/// The first JSON object in `text`, if any.
pub fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    recover_json_values(text).into_iter().find_map(|v| match v {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

fn parse_candidate(candidate: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str(candidate) {
        return Some(v);
    }
    serde_json::from_str(&escape_raw_newlines(candidate)).ok()
}

/// Escape raw line breaks inside string literals, leaving structural
/// whitespace alone.
fn escape_raw_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_embedded_in_prose() {
        let values = recover_json_values(r#"prefix {"a":1} middle [1,2,{"b":2}] suffix"#);
        assert_eq!(values, vec![json!({"a": 1}), json!([1, 2, {"b": 2}])]);
    }

    #[test]
    fn truncated_fragment_is_skipped() {
        let values = recover_json_values(r#"{"a":1} then {"b": [1, 2"#);
        assert_eq!(values, vec![json!({"a": 1})]);
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let values = recover_json_values(r#"{"code": "fn main() { let v = [1; 3]; }", "q": "say \"}\""}"#);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["code"], "fn main() { let v = [1; 3]; }");
        assert_eq!(values[0]["q"], "say \"}\"");
    }

    #[test]
    fn raw_newlines_in_strings_are_repaired() {
        let text = "```json\n{\n  \"coder\": \"line one\nline two\"\n}\n```";
        let values = recover_json_values(text);
        assert_eq!(values, vec![json!({"coder": "line one\nline two"})]);
    }

    #[test]
    fn mismatched_closer_resets() {
        let values = recover_json_values(r#"{"a": [1, 2} {"b": 3}"#);
        assert_eq!(values, vec![json!({"b": 3})]);
    }

    #[test]
    fn invalid_span_is_discarded() {
        assert!(recover_json_values("{not json at all}").is_empty());
        assert!(recover_json_values("").is_empty());
        assert!(recover_json_values("}}]] stray closers").is_empty());
    }

    #[test]
    fn first_object_skips_arrays() {
        let obj = first_json_object(r#"[1,2] and {"x": "y"} and {"z": 1}"#).unwrap();
        assert_eq!(obj.get("x"), Some(&json!("y")));
        assert!(first_json_object("[1]").is_none());
    }
}

use serde_json::Value;

use crate::grading::coerce_to_string;

const HTML_ESCAPES: [(char, &str); 5] = [
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&#39;"),
];

fn replacement(c: char) -> Option<&'static str> {
    HTML_ESCAPES
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
}

/// Escape the five HTML-reserved characters.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match replacement(c) {
            Some(entity) => escaped.push_str(entity),
            None => escaped.push(c),
        }
    }
    escaped
}

/// Absent input passes through untouched.
pub fn escape_html_opt(s: Option<&str>) -> Option<String> {
    s.map(escape_html)
}

/// Escape a loosely typed value. `null` passes through as absent; anything
/// else is coerced to text first.
pub fn escape_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(escape_html(&coerce_to_string(other))),
    }
}

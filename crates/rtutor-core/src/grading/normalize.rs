use serde_json::Value;

use super::coerce_to_string;

/// Quote character every quote mark is folded into.
pub const CANONICAL_QUOTE: char = '"';

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Canonicalize code for fuzzy comparison.
///
/// Strips every whitespace character, turns `'` into `"` and lower-cases the
/// rest. Idempotent: `normalize_code(&normalize_code(s)) == normalize_code(s)`.
pub fn normalize_code(code: &str) -> String {
    let stripped: String = code
        .chars()
        .filter(|c| !c.is_whitespace() && *c != BYTE_ORDER_MARK)
        .map(|c| if c == '\'' { CANONICAL_QUOTE } else { c })
        .collect();
    stripped.to_lowercase()
}

/// Normalize a loosely typed host value. `null` normalizes to "".
pub fn normalize_value(value: &Value) -> String {
    normalize_code(&coerce_to_string(value))
}

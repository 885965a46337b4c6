use serde_json::Value;

use super::{normalize_code, normalize_value};

/// Decide whether a submission matches the expected answer.
///
/// Absent inputs count as empty code, so two absent inputs match.
pub fn compare_code(user_code: Option<&str>, expected_answer: Option<&str>) -> bool {
    normalize_code(user_code.unwrap_or_default()) == normalize_code(expected_answer.unwrap_or_default())
}

/// [`compare_code`] over loosely typed host values.
pub fn compare_values(user_code: &Value, expected_answer: &Value) -> bool {
    normalize_value(user_code) == normalize_value(expected_answer)
}

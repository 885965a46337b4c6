mod coerce;
mod compare;
mod normalize;

pub use coerce::{coerce_to_string, is_truthy, OBJECT_MARKER};
pub use compare::{compare_code, compare_values};
pub use normalize::{normalize_code, normalize_value, CANONICAL_QUOTE};

//! The map and reduce functions plugged into a job.
//!
//! These are hard-coded applications rather than a dynamic-loading
//! mechanism; the rest of the core only ever sees them as opaque
//! `MapFn`/`ReduceFn` values.

use std::sync::Arc;

use crate::mr::store::KeyValue;

/// `map_fn(text) -> ordered sequence of KeyValue`.
pub type MapFn = Arc<dyn Fn(&str) -> Vec<KeyValue> + Send + Sync>;
/// `reduce_fn(key, ordered sequence of value) -> value`.
pub type ReduceFn = Arc<dyn Fn(&str, Vec<String>) -> String + Send + Sync>;

/// Word count, splitting on ASCII whitespace.
pub mod wc {
    use super::KeyValue;

    pub fn map(input: &str) -> Vec<KeyValue> {
        input
            .split_whitespace()
            .map(|word| KeyValue::new(word, "1"))
            .collect()
    }

    pub fn reduce(_key: &str, values: Vec<String>) -> String {
        values.len().to_string()
    }
}

/// Word count, splitting on any run of non-letter characters rather than
/// whitespace (e.g. `"a,b;a"` -> `["a", "b", "a"]`).
pub mod wc_nonletter {
    use super::KeyValue;
    use regex::Regex;
    use std::sync::OnceLock;

    fn splitter() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"[^\p{L}]+").expect("static regex is valid"))
    }

    pub fn map(input: &str) -> Vec<KeyValue> {
        splitter()
            .split(input)
            .filter(|word| !word.is_empty())
            .map(|word| KeyValue::new(word, "1"))
            .collect()
    }

    pub fn reduce(_key: &str, values: Vec<String>) -> String {
        values.len().to_string()
    }
}

/// Wraps a plain `fn` pointer as a `MapFn`.
pub fn map_fn(f: fn(&str) -> Vec<KeyValue>) -> MapFn {
    Arc::new(f)
}

/// Wraps a plain `fn` pointer as a `ReduceFn`.
pub fn reduce_fn(f: fn(&str, Vec<String>) -> String) -> ReduceFn {
    Arc::new(f)
}

//! The wire record type and canonical key form (SPEC_FULL.md §3, §9).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A key-value pair as it travels the wire: `[key, value]` JSON arrays,
/// per the original spec's §6 note on record encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "(Value, Value)", from = "(Value, Value)")]
pub struct Pair {
    pub key: Value,
    pub value: Value,
}

impl Pair {
    pub fn new(key: Value, value: Value) -> Self {
        Self { key, value }
    }
}

impl From<(Value, Value)> for Pair {
    fn from((key, value): (Value, Value)) -> Self {
        Pair { key, value }
    }
}

impl From<Pair> for (Value, Value) {
    fn from(pair: Pair) -> Self {
        (pair.key, pair.value)
    }
}

/// Canonical string form of a key, used both by the partitioner and by
/// reconciliation's key grouping. Strings pass through unchanged; every
/// other JSON shape is rendered via its compact serialization, so that
/// composite keys (arrays, objects) hash and compare consistently across
/// workers regardless of how the mapper happened to construct them.
pub fn canonical_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_keys_pass_through() {
        assert_eq!(canonical_key(&json!("zone-1")), "zone-1");
    }

    #[test]
    fn composite_keys_are_rendered_deterministically() {
        let a = canonical_key(&json!(["zone", 1]));
        let b = canonical_key(&json!(["zone", 1]));
        assert_eq!(a, b);
        assert_eq!(a, "[\"zone\",1]");
    }

    #[test]
    fn pair_round_trips_through_json_array() {
        let pair = Pair::new(json!("k"), json!(42));
        let encoded = serde_json::to_string(&pair).unwrap();
        assert_eq!(encoded, "[\"k\",42]");
        let decoded: Pair = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, pair);
    }
}

pub mod debounce;
pub mod error;
pub mod graph;
pub mod host;
pub mod node;
pub mod validation;

/// The Alias for serde_json::Value since every value on the graph is one
pub type NodeValue = serde_json::Value;

/// The host's untyped per-node settings dictionary.
pub type Settings = serde_json::Map<String, NodeValue>;

/// Truthiness as the graph editor sees it: `null`, `false`, `0` and `""` are
/// falsy, everything else (including empty arrays and objects) is truthy.
pub fn is_truthy(value: &NodeValue) -> bool {
    match value {
        NodeValue::Null => false,
        NodeValue::Bool(b) => *b,
        NodeValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        NodeValue::String(s) => !s.is_empty(),
        NodeValue::Array(_) | NodeValue::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));

        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }
}

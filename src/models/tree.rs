// src/models/tree.rs

//! Pure visitors over the JSON tree union (object, array, string, number, bool, null).

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Call `visit` for every string leaf, at any depth, in document order.
pub fn visit_strings<'a, F>(value: &'a Value, visit: &mut F)
where
    F: FnMut(&'a str),
{
    match value {
        Value::Object(map) => map.values().for_each(|v| visit_strings(v, visit)),
        Value::Array(items) => items.iter().for_each(|v| visit_strings(v, visit)),
        Value::String(s) => visit(s),
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}

/// All string leaves starting with `prefix`, deduplicated.
pub fn strings_with_prefix(value: &Value, prefix: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    visit_strings(value, &mut |s| {
        if s.starts_with(prefix) {
            found.insert(s.to_string());
        }
    });
    found
}

/// Walk a `/`-separated path of object keys.
///
/// Returns `Err(segment)` naming the first segment that is missing or does
/// not hold an object.
pub fn descend<'a>(
    root: &'a Map<String, Value>,
    path: &'a str,
) -> std::result::Result<&'a Map<String, Value>, &'a str> {
    let mut current = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = current
            .get(segment)
            .and_then(Value::as_object)
            .ok_or(segment)?;
    }
    Ok(current)
}

/// String property of an object, if present and textual.
pub fn str_prop<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Scalar rendering of a property value.
///
/// Arrays yield their first element (empty string when empty), `null`
/// yields `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(items.first().and_then(scalar_text).unwrap_or_default()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strings_with_prefix_nested() {
        let tree = json!({
            "a": "/content/x",
            "b": { "c": ["/content/y", "/etc/z", 3, null, {"d": "/content/x"}] },
            "e": true
        });
        let found = strings_with_prefix(&tree, "/content");
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["/content/x".to_string(), "/content/y".to_string()]
        );
    }

    #[test]
    fn test_descend_ok_and_failures() {
        let tree = json!({ "data": { "master": { "title": "T" }, "leaf": "x" } });
        let root = tree.as_object().unwrap();
        assert!(descend(root, "data/master").is_ok());
        assert_eq!(descend(root, "data/missing").unwrap_err(), "missing");
        assert_eq!(descend(root, "data/leaf").unwrap_err(), "leaf");
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&json!("a")), Some("a".into()));
        assert_eq!(scalar_text(&json!(["b", "c"])), Some("b".into()));
        assert_eq!(scalar_text(&json!([])), Some(String::new()));
        assert_eq!(scalar_text(&json!(42)), Some("42".into()));
        assert_eq!(scalar_text(&json!(null)), None);
    }
}

//! Task parameter normalization and tolerant readers.
//!
//! Params live in the task table as one opaque JSON text column. Writes go
//! through [`normalize_params`] so every stored blob is a compact JSON
//! object; reads go through the `*_param` helpers, which treat a missing or
//! malformed key as absent instead of failing the whole task.

use serde_json::{json, Value};

use tickvault_core::coerce;

/// Canonical form for the stored params column.
///
/// - JSON objects serialize compactly.
/// - A string holding a JSON object is unwrapped and re-serialized.
/// - Everything else wraps as `{"value": <original>}`; a bare string stays a
///   string inside the wrapper even when it spells a number.
/// - `null` stores as the empty object.
pub fn normalize_params(params: &Value) -> String {
    match params {
        Value::Object(_) => params.to_string(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(object @ Value::Object(_)) => object.to_string(),
            _ => json!({ "value": text }).to_string(),
        },
        Value::Null => json!({}).to_string(),
        other => json!({ "value": other }).to_string(),
    }
}

/// Reads a stored params blob back. Malformed text reads as `null`, which
/// every key lookup then treats as absent.
pub fn parse_params(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

/// A non-empty trimmed string value for `key`; numbers stringify.
pub fn text_param(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(coerce::text)
}

/// An integer value for `key`; numeric strings and floats coerce.
pub fn int_param(params: &Value, key: &str) -> Option<i64> {
    params.get(key).and_then(coerce::integer)
}

/// The security codes a task addresses: a `codes` array or comma-joined
/// string first, then a single `code`. Order is preserved.
pub fn code_list(params: &Value) -> Vec<String> {
    match params.get("codes") {
        Some(Value::Array(items)) => items.iter().filter_map(coerce::text).collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect(),
        _ => text_param(params, "code").into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_store_compactly() {
        let params = json!({ "code": "600000", "adjust": "all" });
        let stored = normalize_params(&params);
        assert_eq!(parse_params(&stored), params);
        assert!(!stored.contains(' '));
    }

    #[test]
    fn object_strings_unwrap() {
        let stored = normalize_params(&json!("{\"code\":\"600000\"}"));
        assert_eq!(stored, "{\"code\":\"600000\"}");
    }

    #[test]
    fn bare_strings_wrap_without_reinterpretation() {
        // A numeric string stays a string; readers decide what it means.
        assert_eq!(normalize_params(&json!("600000")), "{\"value\":\"600000\"}");
        assert_eq!(normalize_params(&json!("hello")), "{\"value\":\"hello\"}");
        assert_eq!(normalize_params(&json!("[1,2]")), "{\"value\":\"[1,2]\"}");
    }

    #[test]
    fn scalars_and_arrays_wrap() {
        assert_eq!(normalize_params(&json!(7)), "{\"value\":7}");
        assert_eq!(normalize_params(&json!([1, 2])), "{\"value\":[1,2]}");
        assert_eq!(normalize_params(&Value::Null), "{}");
    }

    #[test]
    fn readers_tolerate_mixed_spellings() {
        let params = json!({ "code": 600000, "query_type": "10", "end_date": " 20240105 " });
        assert_eq!(text_param(&params, "code").as_deref(), Some("600000"));
        assert_eq!(int_param(&params, "query_type"), Some(10));
        assert_eq!(text_param(&params, "end_date").as_deref(), Some("20240105"));
        assert_eq!(text_param(&params, "missing"), None);
    }

    #[test]
    fn code_lists_come_from_either_key() {
        assert_eq!(code_list(&json!({ "code": "600000" })), vec!["600000"]);
        assert_eq!(
            code_list(&json!({ "codes": ["600000", 2594] })),
            vec!["600000", "2594"]
        );
        assert_eq!(
            code_list(&json!({ "codes": "600000, 000001 ,," })),
            vec!["600000", "000001"]
        );
        assert!(code_list(&parse_params("not json")).is_empty());
    }
}

//! Tolerant coercion of raw provider cells.
//!
//! Provider tables mix numbers, numeric strings with thousands separators,
//! `"-"` placeholders and plain nulls in the same column. A cell that cannot
//! be read as the requested type coerces to `None` so one dirty cell never
//! fails a whole batch.

use serde_json::Value;

/// Reads a cell as a float. Empty, placeholder and unparseable cells are `None`.
pub fn number(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = clean_numeric(s)?;
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Reads a cell as an integer, truncating floats the provider sends for
/// whole-number columns like volume.
pub fn integer(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let cleaned = clean_numeric(s)?;
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Reads a cell as trimmed text. Numbers render as text so numeric code
/// columns still filter correctly; empty cells are `None`.
pub fn text(cell: &Value) -> Option<String> {
    match cell {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn clean_numeric(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "--" {
        return None;
    }
    Some(trimmed.replace(',', ""))
}

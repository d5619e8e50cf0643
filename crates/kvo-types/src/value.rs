use std::collections::BTreeMap;

use serde_json::Value;

/// Reserved field carrying the concrete class name of a stored record.
///
/// Written alongside user fields on every insert and update, and stripped
/// from the data before it is assigned onto a hydrated object.
pub const TYPE_MARKER_FIELD: &str = "__type";

/// Field-name to value map, the unit of data exchanged with storage.
pub type Record = BTreeMap<String, Value>;

/// Render a scalar the way it appears in identity hashes and flattened keys.
///
/// Strings are used verbatim; every other value uses its JSON text.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns `true` if the value can serve as (part of) an identifier.
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Short name of the JSON kind of a value, for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

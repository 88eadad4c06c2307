//! Link-placeholder substitution.

use serde_json::Value;

use super::prompt::LINK_PLACEHOLDER;

/// Replace every `{{LINK}}` in the string leaves of `value` with `link`.
///
/// Arrays are mapped element-wise and objects rebuilt key by key; numbers,
/// booleans and null pass through. With no link (or an empty one) the value
/// is returned as is.
pub fn inject_link(value: Value, link: Option<&str>) -> Value {
    match link {
        Some(link) if !link.is_empty() => replace(value, link),
        _ => value,
    }
}

fn replace(value: Value, link: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(LINK_PLACEHOLDER, link)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| replace(v, link)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, replace(v, link)))
                .collect(),
        ),
        other => other,
    }
}

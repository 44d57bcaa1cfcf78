//! Key-case conversion between the local snake_case data model and the
//! camelCase wire format.
//!
//! The web API speaks camelCase; everything this crate hands to callers is
//! snake_case. The converters here operate on single keys as well as
//! recursively over whole [`serde_json::Value`] trees, leaving scalar leaf
//! values untouched.

use serde_json::Value;

/// Convert a single camelCase key to snake_case.
///
/// A word boundary is detected wherever a lowercase letter or digit is
/// followed by an uppercase letter. Applying the function to an already
/// snake_case key is a no-op.
///
/// # Example
///
/// ```
/// use omnia_rs::case::snake_key;
///
/// assert_eq!(snake_key("someCamelCasedString"), "some_camel_cased_string");
/// assert_eq!(snake_key("already_snake"), "already_snake");
/// ```
pub fn snake_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower_or_digit = false;

    for c in key.chars() {
        if c.is_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower_or_digit = false;
        } else {
            prev_lower_or_digit = c.is_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }

    out
}

/// Convert a single snake_case key to camelCase.
///
/// Underscores delimit words; the first word keeps its case, subsequent
/// words are capitalized. The first character of the output is lowercased.
///
/// Round-tripping through [`snake_key`] is stable for plain camelCase keys
/// but lossy for acronym-like keys (`"HTTPStatus"` does not survive), a
/// known limitation inherited from the wire format.
///
/// # Example
///
/// ```
/// use omnia_rs::case::camel_key;
///
/// assert_eq!(camel_key("asset_id"), "assetId");
/// assert_eq!(camel_key("name"), "name");
/// ```
pub fn camel_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut capitalize_next = false;

    for c in key.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }

    // Wire convention: leading character is always lowercase.
    let mut chars = out.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            first.to_lowercase().collect::<String>() + chars.as_str()
        }
        _ => out,
    }
}

/// Recursively convert all object keys in a JSON value to snake_case.
///
/// Arrays are traversed element-wise; scalar values pass through unchanged.
pub fn to_snake(value: Value) -> Value {
    convert(value, &snake_key)
}

/// Recursively convert all object keys in a JSON value to camelCase.
///
/// Arrays are traversed element-wise; scalar values pass through unchanged.
pub fn to_camel(value: Value) -> Value {
    convert(value, &camel_key)
}

fn convert(value: Value, key_fn: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (key_fn(&k), convert(v, key_fn)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| convert(v, key_fn)).collect())
        }
        other => other,
    }
}

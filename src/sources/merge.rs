//! Decode-merge of a parsed document into an existing value.
//!
//! The current value is serialized to JSON, the incoming document is merged
//! over it, and the result is deserialized back. The caller's value is only
//! overwritten once every step has succeeded.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Deep-merge `incoming` over `base`.
///
/// Objects merge key by key, recursively. Any other incoming value (arrays,
/// scalars, `null`) replaces what was there.
///
/// # Examples
///
/// ```rust
/// use hotload_config::sources::merge_values;
/// use serde_json::json;
///
/// let mut base = json!({ "server": { "port": 8080, "host": "localhost" } });
/// merge_values(&mut base, json!({ "server": { "port": 9090 } }));
///
/// assert_eq!(base, json!({ "server": { "port": 9090, "host": "localhost" } }));
/// ```
pub fn merge_values(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge a parsed document into `target`.
///
/// Fields of `target` that the document does not mention keep their values.
/// Keys the document has but `T` does not know are dropped by serde (unless
/// `T` opts into `deny_unknown_fields`, which turns them into an error).
///
/// # Skipped fields
///
/// The merge goes through serde in both directions, so a field serde cannot
/// round-trip does not keep its value. Fields marked `#[serde(skip)]` or
/// `#[serde(skip_deserializing)]` come back as their `Default` after every
/// successful merge, whether or not the document mentions them. Keep
/// runtime-only state (handles, caches, counters) outside the merged type.
///
/// # Errors
///
/// Fails if the document root is not an object, if `target` cannot be
/// serialized, or if the merged tree does not deserialize into `T`. `target`
/// is left untouched in every error case.
///
/// # Examples
///
/// ```rust
/// use hotload_config::sources::merge_into;
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
///
/// #[derive(Serialize, Deserialize)]
/// struct AppConfig {
///     port: u16,
///     host: String,
/// }
///
/// let mut cfg = AppConfig { port: 8080, host: "localhost".into() };
/// merge_into(&mut cfg, json!({ "port": 9090, "unknown": true })).unwrap();
///
/// assert_eq!(cfg.port, 9090);
/// assert_eq!(cfg.host, "localhost");
/// ```
pub fn merge_into<T>(target: &mut T, document: Value) -> serde_json::Result<()>
where
    T: Serialize + DeserializeOwned,
{
    if !document.is_object() {
        return Err(serde::de::Error::custom(format!(
            "document root must be an object, found {}",
            kind_of(&document)
        )));
    }

    let mut merged = serde_json::to_value(&*target)?;
    merge_values(&mut merged, document);

    *target = serde_json::from_value(merged)?;
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Layer merge
//!
//! Objects merge key by key; arrays and scalars from the later layer replace
//! the earlier value outright.

use serde_json::Value;

/// Overlay `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let next = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in precedence order (last wins)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

//! JSON merge helpers for layered configuration.

use serde_json::{Map, Value};

/// Recursively merge `overlay` into `base`; non-object values replace.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, overlay) {
        for (key, value) in overlay_map {
            match base_map.get_mut(key) {
                Some(existing) => merge_json_values(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }
    *base = overlay.clone();
}

/// Merge `overlay` into `base`, leaving any key locked by `constraints` untouched.
///
/// An object in the constraints descends one level; any other constraint value
/// locks the key entirely.
pub(super) fn merge_json_with_constraints(
    base: &mut Value,
    overlay: &Value,
    constraints: Option<&Value>,
) {
    let locked = match constraints {
        None => {
            merge_json_values(base, overlay);
            return;
        }
        Some(Value::Object(map)) => map,
        Some(_) => return,
    };
    let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, overlay) else {
        return;
    };
    for (key, value) in overlay_map {
        match locked.get(key) {
            None => match base_map.get_mut(key) {
                Some(existing) => merge_json_values(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            },
            Some(nested @ Value::Object(_)) => {
                let entry = base_map
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                merge_json_with_constraints(entry, value, Some(nested));
            }
            Some(_) => {}
        }
    }
}

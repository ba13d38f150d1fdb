//! Field-by-field merging of settings tiers.

use serde_json::Value;

/// Merge `overlay` into `base` in place.
///
/// Objects merge key by key, recursively. Any other overlay value replaces
/// the base value, lists included. A `null` overlay leaves the base untouched,
/// so a tier can mention a key without setting it.
pub fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        if !value.is_null() {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Merge `tiers` lowest first; later tiers win.
pub fn deep_merge(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, |mut acc, tier| {
        if acc.is_null() {
            tier
        } else {
            merge_into(&mut acc, tier);
            acc
        }
    })
}

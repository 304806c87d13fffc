use serde_json::Value;

/// Visit every value stored under `key` anywhere in the document, depth
/// first. The visitor may rewrite the value in place.
pub fn walk_key(value: &mut Value, key: &str, visit: &mut dyn FnMut(&mut Value)) {
    match value {
        Value::Object(map) => {
            for (name, child) in map.iter_mut() {
                if name == key {
                    visit(child);
                }
                walk_key(child, key, visit);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                walk_key(child, key, visit);
            }
        }
        _ => {}
    }
}

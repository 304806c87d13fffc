use serde_json::{Map, Value};

/// Read the value at a dot-separated path. Numeric segments index arrays.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn get_path_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `new` at the path, creating intermediate objects for missing
/// segments. Existing sibling fields keep their order; only the addressed
/// field is touched.
pub fn set_path(value: &mut Value, path: &str, new: Value) {
    let mut current = value;
    let segments: Vec<&str> = path.split('.').collect();
    for (position, segment) in segments.iter().enumerate() {
        let last = position == segments.len() - 1;
        match current {
            Value::Array(items) => {
                let Some(index) = segment.parse::<usize>().ok().filter(|i| *i < items.len())
                else {
                    return;
                };
                if last {
                    items[index] = new;
                    return;
                }
                current = &mut items[index];
            }
            Value::Object(_) => {
                let map = current.as_object_mut().expect("checked object");
                if last {
                    map.insert((*segment).to_string(), new);
                    return;
                }
                if !map.get(*segment).map(Value::is_object).unwrap_or(false)
                    && !map.get(*segment).map(Value::is_array).unwrap_or(false)
                {
                    map.insert((*segment).to_string(), Value::Object(Map::new()));
                }
                current = map.get_mut(*segment).expect("just inserted");
            }
            _ => return,
        }
    }
}

/// Remove the field at the path. Returns whether something was removed.
pub fn delete_path(value: &mut Value, path: &str) -> bool {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };
    let parent = match parent_path {
        Some(parent) => match get_path_mut(value, parent) {
            Some(parent) => parent,
            None => return false,
        },
        None => value,
    };
    match parent {
        Value::Object(map) => map.shift_remove(leaf).is_some(),
        Value::Array(items) => match leaf.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items.remove(index);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

pub fn get_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    get_path(value, path).and_then(Value::as_str)
}

pub fn get_i64(value: &Value, path: &str) -> Option<i64> {
    let found = get_path(value, path)?;
    found
        .as_i64()
        .or_else(|| found.as_f64().map(|f| f as i64))
}

pub fn get_bool(value: &Value, path: &str) -> Option<bool> {
    get_path(value, path).and_then(Value::as_bool)
}

pub fn get_f64(value: &Value, path: &str) -> Option<f64> {
    get_path(value, path).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_nested_and_array() {
        let doc = json!({"a": {"b": [{"c": 1}, {"c": 2}]}});
        assert_eq!(get_i64(&doc, "a.b.1.c"), Some(2));
        assert_eq!(get_path(&doc, "a.b.5.c"), None);
        assert_eq!(get_path(&doc, "a.x"), None);
    }

    #[test]
    fn set_creates_intermediates() {
        let mut doc = json!({"model": "m"});
        set_path(&mut doc, "thinking.budget_tokens", json!(1024));
        assert_eq!(doc, json!({"model": "m", "thinking": {"budget_tokens": 1024}}));
    }

    #[test]
    fn set_preserves_sibling_order() {
        let mut doc = json!({"z": 1, "a": 2, "m": 3});
        set_path(&mut doc, "a", json!(9));
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn delete_leaf_and_missing() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        assert!(delete_path(&mut doc, "a.b"));
        assert!(!delete_path(&mut doc, "a.b"));
        assert_eq!(doc, json!({"a": {"c": 2}}));
    }

    #[test]
    fn typed_accessors() {
        let doc = json!({"temperature": 1.5, "count": 3, "flag": true, "name": "x"});
        assert_eq!(get_f64(&doc, "temperature"), Some(1.5));
        assert_eq!(get_f64(&doc, "count"), Some(3.0));
        assert_eq!(get_f64(&doc, "name"), None);
        assert_eq!(get_i64(&doc, "temperature"), Some(1));
        assert_eq!(get_bool(&doc, "flag"), Some(true));
    }

    #[test]
    fn set_through_array() {
        let mut doc = json!({"messages": [{"role": "user"}]});
        set_path(&mut doc, "messages.0.role", json!("assistant"));
        assert_eq!(get_str(&doc, "messages.0.role"), Some("assistant"));
    }
}

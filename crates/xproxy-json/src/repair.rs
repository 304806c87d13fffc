use serde_json::Value;

/// Best-effort completion of truncated JSON, as produced by streamed
/// tool-call argument deltas that were cut off mid-object. Closes an
/// unterminated string, drops a dangling separator, balances brackets.
/// Anything still unparseable becomes `{}`.
pub fn repair_json(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return "{}".to_string();
    }
    if serde_json::from_str::<Value>(trimmed).is_ok() {
        return trimmed.to_string();
    }

    let mut repaired = trimmed.to_string();
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in repaired.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    if escaped {
        repaired.pop();
    }
    if in_string {
        repaired.push('"');
    }

    loop {
        let tail = repaired.trim_end().chars().last();
        match tail {
            Some(',') => {
                let cut = repaired.trim_end().len() - 1;
                repaired.truncate(cut);
            }
            Some(':') => {
                repaired.push_str("null");
                break;
            }
            _ => break,
        }
    }

    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }

    if serde_json::from_str::<Value>(&repaired).is_ok() {
        repaired
    } else {
        "{}".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_is_untouched() {
        assert_eq!(repair_json(r#"{"a":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn balances_open_brackets() {
        assert_eq!(repair_json(r#"{"a":{"b":[1,2"#), r#"{"a":{"b":[1,2]}}"#);
    }

    #[test]
    fn closes_unterminated_string() {
        assert_eq!(repair_json(r#"{"path":"/tmp/fi"#), r#"{"path":"/tmp/fi"}"#);
    }

    #[test]
    fn trims_trailing_comma() {
        assert_eq!(repair_json(r#"{"a":1,"#), r#"{"a":1}"#);
    }

    #[test]
    fn dangling_key_gets_null() {
        assert_eq!(repair_json(r#"{"a":"#), r#"{"a":null}"#);
    }

    #[test]
    fn garbage_becomes_empty_object() {
        assert_eq!(repair_json("not json"), "{}");
        assert_eq!(repair_json(""), "{}");
    }
}

use serde_json::{Value, json};

use xproxy_common::Schema;
use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::state::StreamState;

/// Rebuild the tool-name shortening map from the client's original request,
/// so responses can restore the names the client actually sent. Shortening is
/// deterministic, so re-running it over the same tool list reproduces the
/// request-side map exactly.
pub(crate) fn ensure_tool_names(state: &mut StreamState, ctx: &TranslateContext) {
    if !state.tool_names.is_empty() {
        return;
    }
    let request = &ctx.original_request;
    let Some(tools) = request.get("tools").and_then(Value::as_array) else {
        return;
    };
    for tool in tools {
        match ctx.from.schema() {
            Schema::OpenAIChat => {
                if let Some(name) = tool.pointer("/function/name").and_then(Value::as_str) {
                    state.tool_names.shorten(name);
                }
            }
            Schema::Claude | Schema::OpenAIResponses => {
                if let Some(name) = tool.get("name").and_then(Value::as_str) {
                    state.tool_names.shorten(name);
                }
            }
            Schema::Gemini => {
                if let Some(declarations) =
                    tool.get("functionDeclarations").and_then(Value::as_array)
                {
                    for declaration in declarations {
                        if let Some(name) = declaration.get("name").and_then(Value::as_str) {
                            state.tool_names.shorten(name);
                        }
                    }
                }
            }
        }
    }
}

/// Split a `data:<mime>;base64,<payload>` URL. Anything else is None.
pub(crate) fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    Some((mime, payload))
}

/// Parse accumulated tool-call arguments, repairing truncation; `{}` if
/// hopeless.
pub(crate) fn parse_args(raw: &str) -> Value {
    serde_json::from_str(&repair_json(raw)).unwrap_or_else(|_| json!({}))
}

/// Serialize a tool input object into the string `arguments` form.
pub(crate) fn args_string(input: &Value) -> String {
    if input.is_null() {
        return "{}".to_string();
    }
    serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_split() {
        let (mime, data) = parse_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, "AAAA");
        assert!(parse_data_url("https://example.com/cat.png").is_none());
    }

    #[test]
    fn args_repair_round_trip() {
        assert_eq!(parse_args(r#"{"a":1"#), json!({"a": 1}));
        assert_eq!(parse_args("garbage"), json!({}));
        assert_eq!(args_string(&json!({"b": 2})), r#"{"b":2}"#);
        assert_eq!(args_string(&Value::Null), "{}");
    }
}

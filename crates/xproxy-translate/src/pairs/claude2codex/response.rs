use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{ensure_tool_names, parse_args};
use crate::state::StreamState;

/// Convert a complete Responses-API response into a Claude message.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let mut content: Vec<Value> = Vec::new();
    let mut has_tools = false;

    if let Some(output) = body.get("output").and_then(Value::as_array) {
        for item in output {
            match item.get("type").and_then(Value::as_str) {
                Some("reasoning") => {
                    let text: String = item
                        .get("summary")
                        .and_then(Value::as_array)
                        .map(|parts| {
                            parts
                                .iter()
                                .filter_map(|part| part.get("text").and_then(Value::as_str))
                                .collect::<Vec<&str>>()
                                .join("")
                        })
                        .unwrap_or_default();
                    if !text.is_empty() {
                        content.push(json!({
                            "type": "thinking",
                            "thinking": text,
                            "signature": "",
                        }));
                    }
                }
                Some("message") => {
                    if let Some(parts) = item.get("content").and_then(Value::as_array) {
                        for part in parts {
                            if part.get("type").and_then(Value::as_str) == Some("output_text")
                                && let Some(text) = part.get("text").and_then(Value::as_str)
                                && !text.is_empty()
                            {
                                content.push(json!({"type": "text", "text": text}));
                            }
                        }
                    }
                }
                Some("function_call") => {
                    has_tools = true;
                    let name = state.tool_names.restore(
                        item.get("name").and_then(Value::as_str).unwrap_or("tool"),
                    );
                    content.push(json!({
                        "type": "tool_use",
                        "id": item
                            .get("call_id")
                            .or_else(|| item.get("id"))
                            .cloned()
                            .unwrap_or(json!("call")),
                        "name": name,
                        "input": parse_args(
                            item.get("arguments").and_then(Value::as_str).unwrap_or("{}"),
                        ),
                    }));
                }
                _ => {}
            }
        }
    }

    let stop_reason = if has_tools {
        "tool_use"
    } else if body.pointer("/incomplete_details/reason").and_then(Value::as_str)
        == Some("max_output_tokens")
    {
        "max_tokens"
    } else {
        "end_turn"
    };

    let mut out = json!({
        "id": body.get("id").cloned().unwrap_or(json!("msg")),
        "type": "message",
        "role": "assistant",
        "model": body.get("model").cloned().unwrap_or(json!(ctx.model)),
        "content": content,
        "stop_reason": stop_reason,
        "stop_sequence": null,
    });

    if let Some(usage) = body.get("usage") {
        let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
        let cached = usage
            .pointer("/input_tokens_details/cached_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "input_tokens": input - cached,
            "output_tokens": usage
                .get("output_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            "cache_read_input_tokens": cached,
            "cache_creation_input_tokens": 0,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    #[test]
    fn output_items_become_blocks() {
        let ctx = TranslateContext::new(Dialect::Claude, Dialect::Codex, "gpt-5-codex");
        let mut state = StreamState::new();
        let body = json!({
            "id": "resp_k",
            "model": "gpt-5-codex",
            "status": "completed",
            "output": [
                {"type": "reasoning", "summary": [{"type": "summary_text", "text": "route"}]},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "final"}
                ]},
                {"type": "function_call", "call_id": "call_y", "name": "send", "arguments": "{\"to\":\"x\"}"}
            ],
            "usage": {"input_tokens": 9, "output_tokens": 2,
                      "input_tokens_details": {"cached_tokens": 3}}
        });
        let out = transform_response(&ctx, body, &mut state);
        assert_eq!(out["content"][0]["thinking"], json!("route"));
        assert_eq!(out["content"][1]["text"], json!("final"));
        assert_eq!(out["content"][2]["input"], json!({"to": "x"}));
        assert_eq!(out["stop_reason"], json!("tool_use"));
        assert_eq!(out["usage"]["input_tokens"], json!(6));
    }
}

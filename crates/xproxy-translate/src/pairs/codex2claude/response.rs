use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{args_string, ensure_tool_names};
use crate::state::StreamState;

/// Convert a complete Claude message into a Responses-API response document.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let response_id = format!(
        "resp_{}",
        body.get("id").and_then(Value::as_str).unwrap_or("msg")
    );

    let mut output: Vec<Value> = Vec::new();
    let mut has_tools = false;
    let mut function_index = 0usize;

    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("thinking") => {
                    if let Some(text) = block.get("thinking").and_then(Value::as_str)
                        && !text.is_empty()
                    {
                        output.push(json!({
                            "type": "reasoning",
                            "id": format!("rs_{response_id}"),
                            "summary": [{"type": "summary_text", "text": text}],
                        }));
                    }
                }
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str)
                        && !text.is_empty()
                    {
                        output.push(json!({
                            "type": "message",
                            "id": format!("msg_{response_id}"),
                            "status": "completed",
                            "role": "assistant",
                            "content": [{"type": "output_text", "text": text}],
                        }));
                    }
                }
                Some("tool_use") => {
                    has_tools = true;
                    let name = state.tool_names.restore(
                        block.get("name").and_then(Value::as_str).unwrap_or("tool"),
                    );
                    output.push(json!({
                        "type": "function_call",
                        "id": format!("fc_{function_index}"),
                        "call_id": block.get("id").cloned().unwrap_or(json!("call")),
                        "name": name,
                        "arguments": args_string(block.get("input").unwrap_or(&Value::Null)),
                        "status": "completed",
                    }));
                    function_index += 1;
                }
                _ => {}
            }
        }
    }

    let incomplete =
        !has_tools && body.get("stop_reason").and_then(Value::as_str) == Some("max_tokens");

    let mut out = json!({
        "id": response_id,
        "object": "response",
        "created_at": state.created,
        "model": body.get("model").cloned().unwrap_or(json!(ctx.model)),
        "status": if incomplete { "incomplete" } else { "completed" },
        "output": output,
    });
    if incomplete {
        out["incomplete_details"] = json!({"reason": "max_output_tokens"});
    }

    if let Some(usage) = body.get("usage") {
        let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
        let cached = usage
            .get("cache_read_input_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let output_tokens = usage
            .get("output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "input_tokens": input + cached,
            "input_tokens_details": {"cached_tokens": cached},
            "output_tokens": output_tokens,
            "output_tokens_details": {"reasoning_tokens": 0},
            "total_tokens": input + cached + output_tokens,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    #[test]
    fn blocks_map_to_output_items() {
        let ctx = TranslateContext::new(Dialect::Codex, Dialect::Claude, "claude-sonnet-4-5");
        let mut state = StreamState::new();
        let body = json!({
            "id": "msg_t",
            "model": "claude-sonnet-4-5",
            "stop_reason": "tool_use",
            "content": [
                {"type": "thinking", "thinking": "weigh"},
                {"type": "text", "text": "verdict"},
                {"type": "tool_use", "id": "toolu_w", "name": "record", "input": {"ok": true}}
            ],
            "usage": {"input_tokens": 12, "cache_read_input_tokens": 2, "output_tokens": 6}
        });
        let out = transform_response(&ctx, body, &mut state);
        assert_eq!(out["output"][0]["type"], json!("reasoning"));
        assert_eq!(out["output"][1]["content"][0]["text"], json!("verdict"));
        assert_eq!(out["output"][2]["call_id"], json!("toolu_w"));
        assert_eq!(out["output"][2]["arguments"], json!("{\"ok\":true}"));
        assert_eq!(out["status"], json!("completed"));
        assert_eq!(out["usage"]["input_tokens"], json!(14));
    }
}

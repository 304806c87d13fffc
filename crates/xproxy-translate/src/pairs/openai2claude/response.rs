use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::state::StreamState;

/// Convert a complete Claude message into an OpenAI chat completion.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(part) = block.get("text").and_then(Value::as_str) {
                        text.push_str(part);
                    }
                }
                Some("thinking") => {
                    if let Some(part) = block.get("thinking").and_then(Value::as_str) {
                        reasoning.push_str(part);
                    }
                }
                Some("tool_use") => {
                    let name = state.tool_names.restore(
                        block.get("name").and_then(Value::as_str).unwrap_or("tool"),
                    );
                    tool_calls.push(json!({
                        "id": block.get("id").cloned().unwrap_or(json!("tool")),
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": block
                                .get("input")
                                .map(|input| input.to_string())
                                .unwrap_or_else(|| "{}".to_string()),
                        },
                    }));
                }
                _ => {}
            }
        }
    }

    let native = body.get("stop_reason").and_then(Value::as_str);
    let finish_reason = if !tool_calls.is_empty() {
        "tool_calls"
    } else {
        match native {
            Some("max_tokens") => "length",
            Some("tool_use") => "tool_calls",
            Some("refusal") => "content_filter",
            _ => "stop",
        }
    };

    let mut message = json!({
        "role": "assistant",
        "content": if text.is_empty() { Value::Null } else { json!(text) },
    });
    if !reasoning.is_empty() {
        message["reasoning_content"] = json!(reasoning);
    }
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }

    let mut choice = json!({
        "index": 0,
        "message": message,
        "finish_reason": finish_reason,
    });
    if let Some(native) = native {
        choice["native_finish_reason"] = json!(native);
    }

    let mut out = json!({
        "id": body.get("id").cloned().unwrap_or(json!("chatcmpl")),
        "object": "chat.completion",
        "created": state.created,
        "model": body.get("model").cloned().unwrap_or(json!(ctx.model)),
        "choices": [choice],
    });

    if let Some(usage) = body.get("usage") {
        let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
        let cached = usage
            .get("cache_read_input_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let created = usage
            .get("cache_creation_input_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let output = usage
            .get("output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let prompt = input + cached + created;
        out["usage"] = json!({
            "prompt_tokens": prompt,
            "completion_tokens": output,
            "total_tokens": prompt + output,
            "prompt_tokens_details": {"cached_tokens": cached},
        });
    }

    out
}

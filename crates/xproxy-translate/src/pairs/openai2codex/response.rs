use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::state::StreamState;

/// Convert a complete Responses-API response into an OpenAI chat completion.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    if let Some(output) = body.get("output").and_then(Value::as_array) {
        for item in output {
            match item.get("type").and_then(Value::as_str) {
                Some("message") => {
                    if let Some(content) = item.get("content").and_then(Value::as_array) {
                        for part in content {
                            if part.get("type").and_then(Value::as_str) == Some("output_text")
                                && let Some(chunk) = part.get("text").and_then(Value::as_str)
                            {
                                text.push_str(chunk);
                            }
                        }
                    }
                }
                Some("reasoning") => {
                    if let Some(summary) = item.get("summary").and_then(Value::as_array) {
                        for part in summary {
                            if let Some(chunk) = part.get("text").and_then(Value::as_str) {
                                reasoning.push_str(chunk);
                            }
                        }
                    }
                }
                Some("function_call") => {
                    let name = state.tool_names.restore(
                        item.get("name").and_then(Value::as_str).unwrap_or("tool"),
                    );
                    tool_calls.push(json!({
                        "id": item
                            .get("call_id")
                            .or_else(|| item.get("id"))
                            .cloned()
                            .unwrap_or(json!("call")),
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": item
                                .get("arguments")
                                .cloned()
                                .unwrap_or(json!("{}")),
                        },
                    }));
                }
                _ => {}
            }
        }
    }

    let native = body
        .pointer("/incomplete_details/reason")
        .and_then(Value::as_str)
        .or_else(|| body.get("status").and_then(Value::as_str));
    let finish_reason = if !tool_calls.is_empty() {
        "tool_calls"
    } else {
        match native {
            Some("max_output_tokens") => "length",
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

    let mut out = json!({
        "id": body.get("id").cloned().unwrap_or(json!("resp")),
        "object": "chat.completion",
        "created": body.get("created_at").cloned().unwrap_or(json!(0)),
        "model": body.get("model").cloned().unwrap_or(json!(ctx.model)),
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
    });
    if let Some(native) = native {
        out["choices"][0]["native_finish_reason"] = json!(native);
    }

    if let Some(usage) = body.get("usage") {
        let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
        let output = usage
            .get("output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "prompt_tokens": input,
            "completion_tokens": output,
            "total_tokens": usage
                .get("total_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(input + output),
            "prompt_tokens_details": {
                "cached_tokens": usage
                    .pointer("/input_tokens_details/cached_tokens")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            },
            "completion_tokens_details": {
                "reasoning_tokens": usage
                    .pointer("/output_tokens_details/reasoning_tokens")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            },
        });
    }

    out
}

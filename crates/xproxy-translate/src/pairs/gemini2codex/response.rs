use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{ensure_tool_names, parse_args};
use crate::state::StreamState;

/// Convert a complete Responses-API response into a Gemini generate-content
/// response.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let mut parts: Vec<Value> = Vec::new();
    let mut has_tools = false;

    if let Some(output) = body.get("output").and_then(Value::as_array) {
        for item in output {
            match item.get("type").and_then(Value::as_str) {
                Some("reasoning") => {
                    if let Some(summary) = item.get("summary").and_then(Value::as_array) {
                        for part in summary {
                            if let Some(text) = part.get("text").and_then(Value::as_str)
                                && !text.is_empty()
                            {
                                parts.push(json!({"text": text, "thought": true}));
                            }
                        }
                    }
                }
                Some("message") => {
                    if let Some(content) = item.get("content").and_then(Value::as_array) {
                        for part in content {
                            if part.get("type").and_then(Value::as_str) == Some("output_text")
                                && let Some(text) = part.get("text").and_then(Value::as_str)
                                && !text.is_empty()
                            {
                                parts.push(json!({"text": text}));
                            }
                        }
                    }
                }
                Some("function_call") => {
                    has_tools = true;
                    let name = state.tool_names.restore(
                        item.get("name").and_then(Value::as_str).unwrap_or("tool"),
                    );
                    parts.push(json!({
                        "functionCall": {
                            "id": item
                                .get("call_id")
                                .or_else(|| item.get("id"))
                                .cloned()
                                .unwrap_or(json!("call")),
                            "name": name,
                            "args": parse_args(
                                item.get("arguments").and_then(Value::as_str).unwrap_or("{}"),
                            ),
                        },
                    }));
                }
                _ => {}
            }
        }
    }

    let finish_reason = if has_tools {
        "STOP"
    } else if body.pointer("/incomplete_details/reason").and_then(Value::as_str)
        == Some("max_output_tokens")
    {
        "MAX_TOKENS"
    } else {
        "STOP"
    };

    let mut out = json!({
        "candidates": [{
            "content": {"role": "model", "parts": parts},
            "finishReason": finish_reason,
            "index": 0,
        }],
        "responseId": body.get("id").cloned().unwrap_or(json!("response")),
        "modelVersion": body.get("model").cloned().unwrap_or(json!(ctx.model)),
    });

    if let Some(usage) = body.get("usage") {
        let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
        let output_tokens = usage
            .get("output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usageMetadata"] = json!({
            "promptTokenCount": input,
            "candidatesTokenCount": output_tokens,
            "totalTokenCount": usage
                .get("total_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(input + output_tokens),
            "cachedContentTokenCount": usage
                .pointer("/input_tokens_details/cached_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            "thoughtsTokenCount": usage
                .pointer("/output_tokens_details/reasoning_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        });
    }

    out
}

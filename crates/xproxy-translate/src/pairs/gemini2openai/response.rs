use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{ensure_tool_names, parse_args};
use crate::state::StreamState;

/// Convert a complete OpenAI chat completion into a Gemini generate-content
/// response.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let message = body.pointer("/choices/0/message").cloned().unwrap_or(Value::Null);
    let mut parts: Vec<Value> = Vec::new();

    if let Some(reasoning) = message.get("reasoning_content").and_then(Value::as_str)
        && !reasoning.is_empty()
    {
        parts.push(json!({"text": reasoning, "thought": true}));
    }
    if let Some(text) = message.get("content").and_then(Value::as_str)
        && !text.is_empty()
    {
        parts.push(json!({"text": text}));
    }

    let mut has_tools = false;
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            has_tools = true;
            let name = state.tool_names.restore(
                call.pointer("/function/name")
                    .and_then(Value::as_str)
                    .unwrap_or("tool"),
            );
            parts.push(json!({
                "functionCall": {
                    "name": name,
                    "args": parse_args(
                        call.pointer("/function/arguments")
                            .and_then(Value::as_str)
                            .unwrap_or("{}"),
                    ),
                },
            }));
        }
    }

    let finish_reason = if has_tools {
        "STOP"
    } else {
        match body
            .pointer("/choices/0/finish_reason")
            .and_then(Value::as_str)
        {
            Some("length") => "MAX_TOKENS",
            Some("content_filter") => "SAFETY",
            _ => "STOP",
        }
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
        let prompt = usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0);
        let output = usage
            .get("completion_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usageMetadata"] = json!({
            "promptTokenCount": prompt,
            "candidatesTokenCount": output,
            "totalTokenCount": usage
                .get("total_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(prompt + output),
            "cachedContentTokenCount": usage
                .pointer("/prompt_tokens_details/cached_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            "thoughtsTokenCount": usage
                .pointer("/completion_tokens_details/reasoning_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        });
    }

    out
}

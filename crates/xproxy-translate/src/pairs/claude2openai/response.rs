use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{ensure_tool_names, parse_args};
use crate::state::StreamState;

/// Convert a complete OpenAI chat completion into a Claude message.
/// Reasoning precedes text in the output, matching how the dialect orders
/// thinking blocks.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let message = body.pointer("/choices/0/message").cloned().unwrap_or(Value::Null);
    let mut content: Vec<Value> = Vec::new();

    if let Some(reasoning) = message.get("reasoning_content").and_then(Value::as_str)
        && !reasoning.is_empty()
    {
        content.push(json!({"type": "thinking", "thinking": reasoning, "signature": ""}));
    }
    if let Some(text) = message.get("content").and_then(Value::as_str)
        && !text.is_empty()
    {
        content.push(json!({"type": "text", "text": text}));
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
            content.push(json!({
                "type": "tool_use",
                "id": call.get("id").cloned().unwrap_or(json!("tool")),
                "name": name,
                "input": parse_args(
                    call.pointer("/function/arguments")
                        .and_then(Value::as_str)
                        .unwrap_or("{}"),
                ),
            }));
        }
    }

    let native = body
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str);
    let stop_reason = if has_tools {
        "tool_use"
    } else {
        match native {
            Some("length") => "max_tokens",
            Some("tool_calls") | Some("function_call") => "tool_use",
            Some("content_filter") => "refusal",
            _ => "end_turn",
        }
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
        let prompt = usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0);
        let cached = usage
            .pointer("/prompt_tokens_details/cached_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "input_tokens": prompt - cached,
            "output_tokens": usage
                .get("completion_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            "cache_read_input_tokens": cached,
            "cache_creation_input_tokens": 0,
        });
    }

    out
}

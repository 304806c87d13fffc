use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::state::StreamState;

/// Convert a complete OpenAI chat completion into a Responses-API response
/// document. Reasoning precedes the message item when both exist.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let response_id = format!(
        "resp_{}",
        body.get("id").and_then(Value::as_str).unwrap_or("done")
    );
    let message = body.pointer("/choices/0/message").cloned().unwrap_or(Value::Null);

    let mut output: Vec<Value> = Vec::new();
    if let Some(reasoning) = message.get("reasoning_content").and_then(Value::as_str)
        && !reasoning.is_empty()
    {
        output.push(json!({
            "type": "reasoning",
            "id": format!("rs_{response_id}"),
            "summary": [{"type": "summary_text", "text": reasoning}],
        }));
    }
    if let Some(text) = message.get("content").and_then(Value::as_str)
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

    let mut has_tools = false;
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for (index, call) in calls.iter().enumerate() {
            has_tools = true;
            let name = state.tool_names.restore(
                call.pointer("/function/name")
                    .and_then(Value::as_str)
                    .unwrap_or("tool"),
            );
            output.push(json!({
                "type": "function_call",
                "id": format!("fc_{index}"),
                "call_id": call.get("id").cloned().unwrap_or(json!("call")),
                "name": name,
                "arguments": call
                    .pointer("/function/arguments")
                    .cloned()
                    .unwrap_or(json!("{}")),
                "status": "completed",
            }));
        }
    }

    let native = body
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str);
    let incomplete = !has_tools && native == Some("length");

    let mut out = json!({
        "id": response_id,
        "object": "response",
        "created_at": body.get("created").cloned().unwrap_or(json!(0)),
        "model": body.get("model").cloned().unwrap_or(json!(ctx.model)),
        "status": if incomplete { "incomplete" } else { "completed" },
        "output": output,
    });
    if incomplete {
        out["incomplete_details"] = json!({"reason": "max_output_tokens"});
    }

    if let Some(usage) = body.get("usage") {
        let prompt = usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0);
        let completion = usage
            .get("completion_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "input_tokens": prompt,
            "input_tokens_details": {
                "cached_tokens": usage
                    .pointer("/prompt_tokens_details/cached_tokens")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            },
            "output_tokens": completion,
            "output_tokens_details": {
                "reasoning_tokens": usage
                    .pointer("/completion_tokens_details/reasoning_tokens")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            },
            "total_tokens": usage
                .get("total_tokens")
                .and_then(Value::as_i64)
                .unwrap_or(prompt + completion),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    #[test]
    fn completion_becomes_response_document() {
        let ctx = TranslateContext::new(Dialect::Codex, Dialect::OpenAI, "gpt-5");
        let mut state = StreamState::new();
        let body = json!({
            "id": "chatcmpl-7",
            "model": "gpt-5",
            "created": 11,
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "reasoning_content": "sketch",
                    "content": "text answer",
                    "tool_calls": [{
                        "id": "call_m",
                        "type": "function",
                        "function": {"name": "measure", "arguments": "{\"u\":\"cm\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
        });
        let out = transform_response(&ctx, body, &mut state);
        assert_eq!(out["status"], json!("completed"));
        assert_eq!(out["output"][0]["type"], json!("reasoning"));
        assert_eq!(out["output"][1]["type"], json!("message"));
        assert_eq!(out["output"][2]["call_id"], json!("call_m"));
        assert_eq!(out["usage"]["total_tokens"], json!(30));
    }
}

use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{args_string, ensure_tool_names};
use crate::state::StreamState;
use crate::tool_ids::mint_tool_id;

/// Convert a complete Gemini generate-content response into a Responses-API
/// response document.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let response_id = format!(
        "resp_{}",
        body.get("responseId")
            .and_then(Value::as_str)
            .unwrap_or("done")
    );

    let mut reasoning = String::new();
    let mut text = String::new();
    let mut calls: Vec<Value> = Vec::new();

    if let Some(parts) = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    {
        for part in parts {
            if let Some(chunk) = part.get("text").and_then(Value::as_str) {
                if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
                    reasoning.push_str(chunk);
                } else {
                    text.push_str(chunk);
                }
            }
            if let Some(call) = part.get("functionCall") {
                let index = calls.len();
                let name = state
                    .tool_names
                    .restore(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
                calls.push(json!({
                    "type": "function_call",
                    "id": format!("fc_{index}"),
                    "call_id": call
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(mint_tool_id),
                    "name": name,
                    "arguments": args_string(call.get("args").unwrap_or(&Value::Null)),
                    "status": "completed",
                }));
            }
        }
    }

    let mut output: Vec<Value> = Vec::new();
    if !reasoning.is_empty() {
        output.push(json!({
            "type": "reasoning",
            "id": format!("rs_{response_id}"),
            "summary": [{"type": "summary_text", "text": reasoning}],
        }));
    }
    if !text.is_empty() {
        output.push(json!({
            "type": "message",
            "id": format!("msg_{response_id}"),
            "status": "completed",
            "role": "assistant",
            "content": [{"type": "output_text", "text": text}],
        }));
    }
    let has_tools = !calls.is_empty();
    output.extend(calls);

    let incomplete = !has_tools
        && body
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
            == Some("MAX_TOKENS");

    let model = body
        .get("modelVersion")
        .and_then(Value::as_str)
        .map(|model| model.strip_prefix("models/").unwrap_or(model).to_string())
        .unwrap_or_else(|| ctx.model.clone());

    let mut out = json!({
        "id": response_id,
        "object": "response",
        "created_at": state.created,
        "model": model,
        "status": if incomplete { "incomplete" } else { "completed" },
        "output": output,
    });
    if incomplete {
        out["incomplete_details"] = json!({"reason": "max_output_tokens"});
    }

    if let Some(usage) = body.get("usageMetadata") {
        let prompt = usage
            .get("promptTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let output_tokens = usage
            .get("candidatesTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "input_tokens": prompt,
            "input_tokens_details": {
                "cached_tokens": usage
                    .get("cachedContentTokenCount")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            },
            "output_tokens": output_tokens,
            "output_tokens_details": {
                "reasoning_tokens": usage
                    .get("thoughtsTokenCount")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            },
            "total_tokens": usage
                .get("totalTokenCount")
                .and_then(Value::as_i64)
                .unwrap_or(prompt + output_tokens),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    #[test]
    fn parts_assemble_into_items() {
        let ctx = TranslateContext::new(Dialect::Codex, Dialect::Gemini, "gemini-2.5-pro");
        let mut state = StreamState::new();
        let body = json!({
            "responseId": "r7",
            "modelVersion": "models/gemini-2.5-pro",
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "why", "thought": true},
                    {"text": "answer"},
                    {"functionCall": {"name": "wrap", "args": {"z": 0}}}
                ]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
        });
        let out = transform_response(&ctx, body, &mut state);
        assert_eq!(out["output"][0]["type"], json!("reasoning"));
        assert_eq!(out["output"][1]["content"][0]["text"], json!("answer"));
        assert_eq!(out["output"][2]["name"], json!("wrap"));
        assert_eq!(out["status"], json!("completed"));
        assert_eq!(out["model"], json!("gemini-2.5-pro"));
    }
}

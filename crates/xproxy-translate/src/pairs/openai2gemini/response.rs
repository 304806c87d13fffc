use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{args_string, ensure_tool_names};
use crate::state::StreamState;

/// Convert a complete Gemini generate-content response into an OpenAI chat
/// completion.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<Value> = Vec::new();

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
                let name = state
                    .tool_names
                    .restore(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
                let index = tool_calls.len();
                tool_calls.push(json!({
                    "id": call
                        .get("id")
                        .cloned()
                        .unwrap_or(json!(format!("call_{index}"))),
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": args_string(call.get("args").unwrap_or(&Value::Null)),
                    },
                }));
            }
        }
    }

    let native = body
        .pointer("/candidates/0/finishReason")
        .and_then(Value::as_str);
    let finish_reason = if !tool_calls.is_empty() {
        "tool_calls"
    } else {
        match native {
            Some("MAX_TOKENS") => "length",
            Some("SAFETY") | Some("RECITATION") => "content_filter",
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

    let model = body
        .get("modelVersion")
        .and_then(Value::as_str)
        .map(|model| model.strip_prefix("models/").unwrap_or(model).to_string())
        .unwrap_or_else(|| ctx.model.clone());

    let mut out = json!({
        "id": body.get("responseId").cloned().unwrap_or(json!("response")),
        "object": "chat.completion",
        "created": state.created,
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
    });
    if let Some(native) = native {
        out["choices"][0]["native_finish_reason"] = json!(native.to_ascii_lowercase());
    }

    if let Some(usage) = body.get("usageMetadata") {
        let prompt = usage
            .get("promptTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let output = usage
            .get("candidatesTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let cached = usage
            .get("cachedContentTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "prompt_tokens": prompt,
            "completion_tokens": output,
            "total_tokens": usage
                .get("totalTokenCount")
                .and_then(Value::as_i64)
                .unwrap_or(prompt + output),
            "prompt_tokens_details": {"cached_tokens": cached},
            "completion_tokens_details": {
                "reasoning_tokens": usage
                    .get("thoughtsTokenCount")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            },
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    #[test]
    fn candidate_maps_to_choice() {
        let ctx = TranslateContext::new(Dialect::OpenAI, Dialect::Gemini, "gemini-2.5-pro");
        let mut state = StreamState::new();
        let body = json!({
            "responseId": "r1",
            "modelVersion": "models/gemini-2.5-pro",
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "ponder", "thought": true},
                    {"text": "result"},
                    {"functionCall": {"name": "act", "args": {"n": 1}}}
                ]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 3, "totalTokenCount": 12}
        });
        let out = transform_response(&ctx, body, &mut state);
        let message = &out["choices"][0]["message"];
        assert_eq!(message["content"], json!("result"));
        assert_eq!(message["reasoning_content"], json!("ponder"));
        assert_eq!(message["tool_calls"][0]["function"]["arguments"], json!("{\"n\":1}"));
        assert_eq!(out["choices"][0]["finish_reason"], json!("tool_calls"));
        assert_eq!(out["model"], json!("gemini-2.5-pro"));
        assert_eq!(out["usage"]["total_tokens"], json!(12));
    }
}

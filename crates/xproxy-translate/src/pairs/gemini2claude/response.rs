use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::state::StreamState;

/// Convert a complete Claude message into a Gemini generate-content
/// response.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let mut parts: Vec<Value> = Vec::new();
    let mut has_tools = false;

    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        parts.push(json!({"text": text}));
                    }
                }
                Some("thinking") => {
                    if let Some(text) = block.get("thinking").and_then(Value::as_str) {
                        parts.push(json!({"text": text, "thought": true}));
                    }
                }
                Some("tool_use") => {
                    has_tools = true;
                    let name = state.tool_names.restore(
                        block.get("name").and_then(Value::as_str).unwrap_or("tool"),
                    );
                    parts.push(json!({
                        "functionCall": {
                            "id": block.get("id").cloned().unwrap_or(json!("tool")),
                            "name": name,
                            "args": block.get("input").cloned().unwrap_or(json!({})),
                        },
                    }));
                }
                _ => {}
            }
        }
    }

    let finish_reason = if has_tools {
        "STOP"
    } else {
        match body.get("stop_reason").and_then(Value::as_str) {
            Some("max_tokens") => "MAX_TOKENS",
            Some("refusal") => "SAFETY",
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
        let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
        let cached = usage
            .get("cache_read_input_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let output = usage
            .get("output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usageMetadata"] = json!({
            "promptTokenCount": input + cached,
            "candidatesTokenCount": output,
            "totalTokenCount": input + cached + output,
            "cachedContentTokenCount": cached,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    #[test]
    fn blocks_become_parts() {
        let ctx = TranslateContext::new(Dialect::Gemini, Dialect::Claude, "claude-sonnet-4-5");
        let mut state = StreamState::new();
        let body = json!({
            "id": "msg_7",
            "model": "claude-sonnet-4-5",
            "stop_reason": "end_turn",
            "content": [
                {"type": "text", "text": "plain"},
                {"type": "tool_use", "id": "toolu_2", "name": "act", "input": {"v": 2}}
            ],
            "usage": {"input_tokens": 5, "cache_read_input_tokens": 1, "output_tokens": 3}
        });
        let out = transform_response(&ctx, body, &mut state);
        let parts = out["candidates"][0]["content"]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["text"], json!("plain"));
        assert_eq!(parts[1]["functionCall"]["args"], json!({"v": 2}));
        assert_eq!(out["candidates"][0]["finishReason"], json!("STOP"));
        assert_eq!(out["usageMetadata"]["promptTokenCount"], json!(6));
    }
}

use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::state::StreamState;
use crate::tool_ids::mint_tool_id;

/// Convert a complete Gemini generate-content response into a Claude message.
/// Reasoning parts come first, then text, then tool use, unless the upstream
/// interleaved them, in which case the part order is preserved.
pub fn transform_response(ctx: &TranslateContext, body: Value, state: &mut StreamState) -> Value {
    ensure_tool_names(state, ctx);

    let mut content: Vec<Value> = Vec::new();
    let mut has_tools = false;

    if let Some(parts) = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
                    content.push(json!({"type": "thinking", "thinking": text, "signature": ""}));
                } else {
                    content.push(json!({"type": "text", "text": text}));
                }
            }
            if let Some(call) = part.get("functionCall") {
                has_tools = true;
                let name = state
                    .tool_names
                    .restore(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
                content.push(json!({
                    "type": "tool_use",
                    "id": call
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(mint_tool_id),
                    "name": name,
                    "input": call.get("args").cloned().unwrap_or(json!({})),
                }));
            }
        }
    }

    let stop_reason = if has_tools {
        "tool_use"
    } else {
        match body
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
        {
            Some("MAX_TOKENS") => "max_tokens",
            Some("SAFETY") | Some("RECITATION") => "refusal",
            _ => "end_turn",
        }
    };

    let model = body
        .get("modelVersion")
        .and_then(Value::as_str)
        .map(|model| model.strip_prefix("models/").unwrap_or(model).to_string())
        .unwrap_or_else(|| ctx.model.clone());

    let mut out = json!({
        "id": body.get("responseId").cloned().unwrap_or(json!("msg")),
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": content,
        "stop_reason": stop_reason,
        "stop_sequence": null,
    });

    if let Some(usage) = body.get("usageMetadata") {
        let prompt = usage
            .get("promptTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let cached = usage
            .get("cachedContentTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        out["usage"] = json!({
            "input_tokens": prompt - cached,
            "output_tokens": usage
                .get("candidatesTokenCount")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            "cache_read_input_tokens": cached,
            "cache_creation_input_tokens": 0,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    #[test]
    fn parts_map_to_blocks_in_order() {
        let ctx = TranslateContext::new(Dialect::Claude, Dialect::Gemini, "gemini-2.5-pro");
        let mut state = StreamState::new();
        let body = json!({
            "responseId": "r9",
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "think", "thought": true},
                    {"text": "answer"},
                    {"functionCall": {"name": "go", "args": {"d": "n"}}}
                ]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 8, "cachedContentTokenCount": 2, "candidatesTokenCount": 4}
        });
        let out = transform_response(&ctx, body, &mut state);
        assert_eq!(out["content"][0]["type"], json!("thinking"));
        assert_eq!(out["content"][1]["text"], json!("answer"));
        assert_eq!(out["content"][2]["name"], json!("go"));
        assert!(out["content"][2]["id"].as_str().unwrap().starts_with("toolu_"));
        assert_eq!(out["stop_reason"], json!("tool_use"));
        assert_eq!(out["usage"]["input_tokens"], json!(6));
    }
}

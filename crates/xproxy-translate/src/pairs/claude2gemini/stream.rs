use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{args_string, ensure_tool_names};
use crate::sse::render_named;
use crate::state::{StreamState, Usage};
use crate::tool_ids::mint_tool_id;

/// Streaming translation of Gemini generate-content chunks into Claude
/// message events. Gemini has no tool-call ids, so each `functionCall` block
/// gets a freshly minted one.
pub fn transform_stream(ctx: &TranslateContext, chunk: &str, state: &mut StreamState) -> Vec<String> {
    let payload = chunk.trim();
    if payload.is_empty() {
        return Vec::new();
    }
    if payload == "[DONE]" {
        return finalize(state);
    }
    let Ok(event) = serde_json::from_str::<Value>(payload) else {
        return Vec::new();
    };

    let mut out = Vec::new();

    if !state.message_started {
        state.message_started = true;
        state.response_id = event
            .get("responseId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| mint_tool_id().replace("toolu_", "msg_"));
        state.model = event
            .get("modelVersion")
            .and_then(Value::as_str)
            .map(|model| model.strip_prefix("models/").unwrap_or(model).to_string())
            .unwrap_or_else(|| ctx.model.clone());
        out.push(render_named(
            "message_start",
            &json!({
                "type": "message_start",
                "message": {
                    "id": state.response_id,
                    "type": "message",
                    "role": "assistant",
                    "model": state.model,
                    "content": [],
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": {"input_tokens": 0, "output_tokens": 0},
                },
            }),
        ));
    }

    record_usage(state, event.get("usageMetadata"));

    let mut finish: Option<String> = None;
    if let Some(candidate) = event.pointer("/candidates/0") {
        if let Some(parts) = candidate.pointer("/content/parts").and_then(Value::as_array) {
            for part in parts {
                out.extend(handle_part(ctx, state, part));
            }
        }
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            finish = Some(reason.to_string());
        }
    }

    if let Some(reason) = finish {
        state.native_finish_reason = Some(reason);
        out.extend(finalize(state));
    }

    out
}

fn handle_part(ctx: &TranslateContext, state: &mut StreamState, part: &Value) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(text) = part.get("text").and_then(Value::as_str)
        && !text.is_empty()
    {
        if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
            out.extend(open_thinking(state));
            out.push(render_named(
                "content_block_delta",
                &json!({
                    "type": "content_block_delta",
                    "index": state.thinking_block.expect("thinking block open"),
                    "delta": {"type": "thinking_delta", "thinking": text},
                }),
            ));
        } else {
            out.extend(open_text(state));
            out.push(render_named(
                "content_block_delta",
                &json!({
                    "type": "content_block_delta",
                    "index": state.text_block.expect("text block open"),
                    "delta": {"type": "text_delta", "text": text},
                }),
            ));
        }
    }

    if let Some(call) = part.get("functionCall") {
        ensure_tool_names(state, ctx);
        out.extend(close_content_blocks(state));
        state.saw_tool_call = true;
        let index = state.next_block();
        let id = call
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(mint_tool_id);
        let name = state
            .tool_names
            .restore(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
        let arguments = args_string(call.get("args").unwrap_or(&Value::Null));
        out.push(render_named(
            "content_block_start",
            &json!({
                "type": "content_block_start",
                "index": index,
                "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}},
            }),
        ));
        out.push(render_named(
            "content_block_delta",
            &json!({
                "type": "content_block_delta",
                "index": index,
                "delta": {"type": "input_json_delta", "partial_json": arguments},
            }),
        ));
        out.push(render_named(
            "content_block_stop",
            &json!({"type": "content_block_stop", "index": index}),
        ));
    }

    out
}

fn open_text(state: &mut StreamState) -> Vec<String> {
    let mut out = close_thinking(state);
    if state.text_block.is_none() {
        let index = state.next_block();
        state.text_block = Some(index);
        out.push(render_named(
            "content_block_start",
            &json!({
                "type": "content_block_start",
                "index": index,
                "content_block": {"type": "text", "text": ""},
            }),
        ));
    }
    out
}

fn open_thinking(state: &mut StreamState) -> Vec<String> {
    let mut out = close_text(state);
    if state.thinking_block.is_none() {
        let index = state.next_block();
        state.thinking_block = Some(index);
        out.push(render_named(
            "content_block_start",
            &json!({
                "type": "content_block_start",
                "index": index,
                "content_block": {"type": "thinking", "thinking": ""},
            }),
        ));
    }
    out
}

fn close_text(state: &mut StreamState) -> Vec<String> {
    match state.text_block.take() {
        Some(index) => vec![render_named(
            "content_block_stop",
            &json!({"type": "content_block_stop", "index": index}),
        )],
        None => Vec::new(),
    }
}

fn close_thinking(state: &mut StreamState) -> Vec<String> {
    match state.thinking_block.take() {
        Some(index) => vec![render_named(
            "content_block_stop",
            &json!({"type": "content_block_stop", "index": index}),
        )],
        None => Vec::new(),
    }
}

fn close_content_blocks(state: &mut StreamState) -> Vec<String> {
    let mut out = close_text(state);
    out.extend(close_thinking(state));
    out
}

fn finalize(state: &mut StreamState) -> Vec<String> {
    if state.stop_emitted {
        return Vec::new();
    }
    state.stop_emitted = true;
    state.finish_emitted = true;

    let mut out = close_content_blocks(state);
    let usage = state.usage.unwrap_or_default();
    out.push(render_named(
        "message_delta",
        &json!({
            "type": "message_delta",
            "delta": {"stop_reason": stop_reason(state), "stop_sequence": null},
            "usage": {
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "cache_read_input_tokens": usage.cached_tokens,
            },
        }),
    ));
    out.push(render_named(
        "message_stop",
        &json!({"type": "message_stop"}),
    ));
    out
}

fn stop_reason(state: &StreamState) -> &'static str {
    if state.saw_tool_call {
        return "tool_use";
    }
    match state.native_finish_reason.as_deref() {
        Some("MAX_TOKENS") => "max_tokens",
        Some("SAFETY") | Some("RECITATION") | Some("PROHIBITED_CONTENT") => "refusal",
        _ => "end_turn",
    }
}

fn record_usage(state: &mut StreamState, usage: Option<&Value>) {
    let Some(usage) = usage else { return };
    let prompt = usage
        .get("promptTokenCount")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let cached = usage
        .get("cachedContentTokenCount")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    state.usage = Some(Usage {
        input_tokens: prompt - cached,
        output_tokens: usage
            .get("candidatesTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: usage
            .get("thoughtsTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        total_tokens: usage
            .get("totalTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    fn events_of(chunks: &[&str]) -> Vec<(String, Value)> {
        let ctx = TranslateContext::new(Dialect::Claude, Dialect::Gemini, "gemini-2.5-pro");
        let mut state = StreamState::new();
        chunks
            .iter()
            .flat_map(|chunk| transform_stream(&ctx, chunk, &mut state))
            .map(|block| {
                let mut lines = block.lines();
                let event = lines
                    .next()
                    .unwrap()
                    .strip_prefix("event: ")
                    .unwrap()
                    .to_string();
                let data = lines.next().unwrap().strip_prefix("data: ").unwrap();
                (event, serde_json::from_str(data).unwrap())
            })
            .collect()
    }

    #[test]
    fn function_call_block_carries_minted_id() {
        let events = events_of(&[
            r#"{"responseId":"r1","candidates":[{"content":{"parts":[{"functionCall":{"name":"act","args":{"a":1}}}]},"index":0}]}"#,
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP","index":0}],"usageMetadata":{"promptTokenCount":2,"candidatesTokenCount":1,"totalTokenCount":3}}"#,
        ]);
        let start = events
            .iter()
            .find(|(name, _)| name == "content_block_start")
            .unwrap();
        let id = start.1["content_block"]["id"].as_str().unwrap();
        assert!(id.starts_with("toolu_"));
        let delta = events
            .iter()
            .find(|(name, _)| name == "content_block_delta")
            .unwrap();
        assert_eq!(delta.1["delta"]["partial_json"], json!("{\"a\":1}"));
        let finish = events
            .iter()
            .find(|(name, _)| name == "message_delta")
            .unwrap();
        assert_eq!(finish.1["delta"]["stop_reason"], json!("tool_use"));
    }

    #[test]
    fn thought_and_text_get_separate_blocks() {
        let events = events_of(&[
            r#"{"responseId":"r2","candidates":[{"content":{"parts":[{"text":"mull","thought":true},{"text":"say"}]},"index":0}]}"#,
        ]);
        let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            [
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta"
            ]
        );
        assert_eq!(events[1].1["content_block"]["type"], json!("thinking"));
        assert_eq!(events[4].1["content_block"]["type"], json!("text"));
    }

    #[test]
    fn finish_reports_usage_once() {
        let events = events_of(&[
            r#"{"responseId":"r3","candidates":[{"content":{"parts":[{"text":"x"}]},"finishReason":"MAX_TOKENS","index":0}],"usageMetadata":{"promptTokenCount":10,"cachedContentTokenCount":4,"candidatesTokenCount":5,"totalTokenCount":15}}"#,
            "[DONE]",
        ]);
        let deltas: Vec<_> = events
            .iter()
            .filter(|(name, _)| name == "message_delta")
            .collect();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].1["delta"]["stop_reason"], json!("max_tokens"));
        assert_eq!(deltas[0].1["usage"]["input_tokens"], json!(6));
        assert_eq!(deltas[0].1["usage"]["cache_read_input_tokens"], json!(4));
        assert_eq!(
            events.iter().filter(|(name, _)| name == "message_stop").count(),
            1
        );
    }
}

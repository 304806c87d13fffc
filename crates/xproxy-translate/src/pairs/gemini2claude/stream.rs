use serde_json::{Value, json};

use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::pairs::util::{ensure_tool_names, parse_args};
use crate::sse::render_data;
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of Claude message events into Gemini
/// generate-content chunks.
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
    match event.get("type").and_then(Value::as_str) {
        Some("message_start") => {
            if let Some(id) = event.pointer("/message/id").and_then(Value::as_str) {
                state.response_id = id.to_string();
            }
            state.model = event
                .pointer("/message/model")
                .and_then(Value::as_str)
                .unwrap_or(&ctx.model)
                .to_string();
            state.message_started = true;
            record_message_usage(state, event.pointer("/message/usage"));
        }
        Some("content_block_start") => {
            let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
            if event.pointer("/content_block/type").and_then(Value::as_str) == Some("tool_use") {
                ensure_tool_names(state, ctx);
                state.saw_tool_call = true;
                state.tool_calls.insert(
                    index,
                    ToolCall {
                        id: event
                            .pointer("/content_block/id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        name: state.tool_names.restore(
                            event
                                .pointer("/content_block/name")
                                .and_then(Value::as_str)
                                .unwrap_or("tool"),
                        ),
                        arguments: String::new(),
                        block_index: index as u32,
                        started: true,
                        closed: false,
                    },
                );
            }
        }
        Some("content_block_delta") => {
            let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
            match event.pointer("/delta/type").and_then(Value::as_str) {
                Some("text_delta") => {
                    if let Some(text) = event.pointer("/delta/text").and_then(Value::as_str) {
                        out.push(render_data(&make_chunk(
                            state,
                            vec![json!({"text": text})],
                            None,
                            false,
                        )));
                    }
                }
                Some("thinking_delta") => {
                    if let Some(text) = event.pointer("/delta/thinking").and_then(Value::as_str) {
                        out.push(render_data(&make_chunk(
                            state,
                            vec![json!({"text": text, "thought": true})],
                            None,
                            false,
                        )));
                    }
                }
                Some("input_json_delta") => {
                    if let Some(fragment) =
                        event.pointer("/delta/partial_json").and_then(Value::as_str)
                        && let Some(call) = state.tool_calls.get_mut(&index)
                    {
                        call.arguments.push_str(fragment);
                    }
                }
                _ => {}
            }
        }
        Some("content_block_stop") => {
            let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
            if let Some(call) = state.tool_calls.get_mut(&index)
                && !call.closed
            {
                call.closed = true;
                let name = call.name.clone();
                let id = call.id.clone();
                let args = parse_args(&repair_json(&call.arguments));
                out.push(render_data(&make_chunk(
                    state,
                    vec![json!({"functionCall": {"id": id, "name": name, "args": args}})],
                    None,
                    false,
                )));
            }
        }
        Some("message_delta") => {
            record_delta_usage(state, event.get("usage"));
            if let Some(reason) = event.pointer("/delta/stop_reason").and_then(Value::as_str) {
                state.native_finish_reason = Some(reason.to_string());
                out.extend(finalize(state));
            }
        }
        Some("message_stop") => {
            out.extend(finalize(state));
        }
        _ => {}
    }
    out
}

fn finalize(state: &mut StreamState) -> Vec<String> {
    if state.finish_emitted {
        return Vec::new();
    }
    state.finish_emitted = true;
    state.stop_emitted = true;
    let reason = finish_reason(state);
    vec![render_data(&make_chunk(
        state,
        Vec::new(),
        Some(reason),
        true,
    ))]
}

fn finish_reason(state: &StreamState) -> &'static str {
    if state.saw_tool_call {
        return "STOP";
    }
    match state.native_finish_reason.as_deref() {
        Some("max_tokens") => "MAX_TOKENS",
        Some("refusal") => "SAFETY",
        _ => "STOP",
    }
}

fn make_chunk(
    state: &StreamState,
    parts: Vec<Value>,
    finish_reason: Option<&'static str>,
    with_usage: bool,
) -> Value {
    let mut candidate = json!({
        "content": {"role": "model", "parts": parts},
        "index": 0,
    });
    if let Some(reason) = finish_reason {
        candidate["finishReason"] = json!(reason);
    }

    let mut chunk = json!({
        "candidates": [candidate],
        "responseId": if state.response_id.is_empty() { "response" } else { &state.response_id },
        "modelVersion": state.model,
    });
    if with_usage && let Some(usage) = &state.usage {
        chunk["usageMetadata"] = json!({
            "promptTokenCount": usage.input_tokens + usage.cached_tokens,
            "candidatesTokenCount": usage.output_tokens,
            "totalTokenCount": usage.input_tokens + usage.cached_tokens + usage.output_tokens,
            "cachedContentTokenCount": usage.cached_tokens,
        });
    }
    chunk
}

fn record_message_usage(state: &mut StreamState, usage: Option<&Value>) {
    let Some(usage) = usage else { return };
    let mut current = state.usage.unwrap_or_default();
    if let Some(input) = usage.get("input_tokens").and_then(Value::as_i64) {
        current.input_tokens = input;
    }
    if let Some(cached) = usage.get("cache_read_input_tokens").and_then(Value::as_i64) {
        current.cached_tokens = cached;
    }
    state.usage = Some(current);
}

fn record_delta_usage(state: &mut StreamState, usage: Option<&Value>) {
    let Some(usage) = usage else { return };
    let mut current = state.usage.unwrap_or_default();
    if let Some(output) = usage.get("output_tokens").and_then(Value::as_i64) {
        current.output_tokens = output;
    }
    if let Some(input) = usage.get("input_tokens").and_then(Value::as_i64) {
        current.input_tokens = input;
    }
    if let Some(cached) = usage.get("cache_read_input_tokens").and_then(Value::as_i64) {
        current.cached_tokens = cached;
    }
    current.total_tokens = current.input_tokens + current.cached_tokens + current.output_tokens;
    state.usage = Some(current);
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    fn chunks_of(events: &[&str]) -> Vec<Value> {
        let ctx = TranslateContext::new(Dialect::Gemini, Dialect::Claude, "claude-sonnet-4-5");
        let mut state = StreamState::new();
        events
            .iter()
            .flat_map(|event| transform_stream(&ctx, event, &mut state))
            .map(|line| serde_json::from_str(line.trim_start_matches("data: ").trim()).unwrap())
            .collect()
    }

    #[test]
    fn text_and_thinking_become_parts() {
        let chunks = chunks_of(&[
            r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-sonnet-4-5","usage":{"input_tokens":3}}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"mull"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"out"}}"#,
        ]);
        assert_eq!(
            chunks[0]["candidates"][0]["content"]["parts"][0],
            json!({"text": "mull", "thought": true})
        );
        assert_eq!(
            chunks[1]["candidates"][0]["content"]["parts"][0]["text"],
            json!("out")
        );
    }

    #[test]
    fn tool_use_emits_complete_function_call() {
        let chunks = chunks_of(&[
            r#"{"type":"message_start","message":{"id":"msg_2","model":"m"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"go"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"d\":"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"\"n\"}"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":9}}"#,
        ]);
        let call = &chunks[0]["candidates"][0]["content"]["parts"][0]["functionCall"];
        assert_eq!(call["name"], json!("go"));
        assert_eq!(call["args"], json!({"d": "n"}));
        let last = chunks.last().unwrap();
        assert_eq!(last["candidates"][0]["finishReason"], json!("STOP"));
        assert_eq!(last["usageMetadata"]["candidatesTokenCount"], json!(9));
    }

    #[test]
    fn max_tokens_reason_maps() {
        let chunks = chunks_of(&[
            r#"{"type":"message_start","message":{"id":"m","model":"m","usage":{"input_tokens":1}}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":2}}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0]["candidates"][0]["finishReason"],
            json!("MAX_TOKENS")
        );
    }
}

use serde_json::{Value, json};

use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::pairs::util::{ensure_tool_names, parse_args};
use crate::sse::render_data;
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of Responses-API events into Gemini
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
        Some("response.created") => {
            state.message_started = true;
            state.response_id = event
                .pointer("/response/id")
                .and_then(Value::as_str)
                .unwrap_or("response")
                .to_string();
            state.model = event
                .pointer("/response/model")
                .and_then(Value::as_str)
                .unwrap_or(&ctx.model)
                .to_string();
        }
        Some("response.output_item.added") => {
            let item = event.get("item").cloned().unwrap_or(Value::Null);
            if item.get("type").and_then(Value::as_str) == Some("function_call") {
                ensure_tool_names(state, ctx);
                let output_index = event
                    .get("output_index")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                state.saw_tool_call = true;
                state.tool_calls.insert(
                    output_index,
                    ToolCall {
                        id: item
                            .get("call_id")
                            .or_else(|| item.get("id"))
                            .and_then(Value::as_str)
                            .unwrap_or("call")
                            .to_string(),
                        name: state.tool_names.restore(
                            item.get("name").and_then(Value::as_str).unwrap_or("tool"),
                        ),
                        arguments: String::new(),
                        block_index: output_index as u32,
                        started: true,
                        closed: false,
                    },
                );
            }
        }
        Some("response.output_text.delta") => {
            if let Some(delta) = event.get("delta").and_then(Value::as_str)
                && !delta.is_empty()
            {
                out.push(render_data(&make_chunk(
                    state,
                    vec![json!({"text": delta})],
                    None,
                    false,
                )));
            }
        }
        Some("response.reasoning_summary_text.delta") | Some("response.reasoning_text.delta") => {
            if let Some(delta) = event.get("delta").and_then(Value::as_str)
                && !delta.is_empty()
            {
                out.push(render_data(&make_chunk(
                    state,
                    vec![json!({"text": delta, "thought": true})],
                    None,
                    false,
                )));
            }
        }
        Some("response.function_call_arguments.delta") => {
            let output_index = event
                .get("output_index")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            if let Some(delta) = event.get("delta").and_then(Value::as_str)
                && let Some(call) = state.tool_calls.get_mut(&output_index)
            {
                call.arguments.push_str(delta);
            }
        }
        Some("response.output_item.done") => {
            let item = event.get("item").cloned().unwrap_or(Value::Null);
            if item.get("type").and_then(Value::as_str) == Some("function_call") {
                let output_index = event
                    .get("output_index")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                if let Some(call) = state.tool_calls.get_mut(&output_index)
                    && !call.closed
                {
                    call.closed = true;
                    if let Some(arguments) = item.get("arguments").and_then(Value::as_str) {
                        call.arguments = arguments.to_string();
                    }
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
        }
        Some("response.completed") | Some("response.incomplete") | Some("response.failed") => {
            record_usage(state, event.pointer("/response/usage"));
            state.native_finish_reason = event
                .pointer("/response/incomplete_details/reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    event
                        .pointer("/response/status")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
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
        Some("max_output_tokens") => "MAX_TOKENS",
        Some("failed") => "SAFETY",
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
            "totalTokenCount": usage.total_tokens,
            "cachedContentTokenCount": usage.cached_tokens,
            "thoughtsTokenCount": usage.reasoning_tokens,
        });
    }
    chunk
}

fn record_usage(state: &mut StreamState, usage: Option<&Value>) {
    let Some(usage) = usage else { return };
    let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
    let cached = usage
        .pointer("/input_tokens_details/cached_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let output = usage
        .get("output_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    state.usage = Some(Usage {
        input_tokens: input - cached,
        output_tokens: output,
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: usage
            .pointer("/output_tokens_details/reasoning_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        total_tokens: usage
            .get("total_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(input + output),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    fn chunks_of(events: &[&str]) -> Vec<Value> {
        let ctx = TranslateContext::new(Dialect::Gemini, Dialect::Codex, "gpt-5-codex");
        let mut state = StreamState::new();
        events
            .iter()
            .flat_map(|event| transform_stream(&ctx, event, &mut state))
            .map(|line| serde_json::from_str(line.trim_start_matches("data: ").trim()).unwrap())
            .collect()
    }

    #[test]
    fn text_and_reasoning_become_parts() {
        let chunks = chunks_of(&[
            r#"{"type":"response.created","response":{"id":"resp_g","model":"gpt-5-codex"}}"#,
            r#"{"type":"response.reasoning_summary_text.delta","delta":"why","output_index":0}"#,
            r#"{"type":"response.output_text.delta","delta":"what","output_index":1}"#,
        ]);
        assert_eq!(
            chunks[0]["candidates"][0]["content"]["parts"][0],
            json!({"text": "why", "thought": true})
        );
        assert_eq!(
            chunks[1]["candidates"][0]["content"]["parts"][0]["text"],
            json!("what")
        );
    }

    #[test]
    fn function_call_surfaces_on_item_done() {
        let chunks = chunks_of(&[
            r#"{"type":"response.created","response":{"id":"resp_h","model":"m"}}"#,
            r#"{"type":"response.output_item.added","output_index":0,"item":{"type":"function_call","call_id":"call_p","name":"ping"}}"#,
            r#"{"type":"response.function_call_arguments.delta","output_index":0,"delta":"{\"host\":\"a\"}"}"#,
            r#"{"type":"response.output_item.done","output_index":0,"item":{"type":"function_call","call_id":"call_p","name":"ping","arguments":"{\"host\":\"a\"}"}}"#,
            r#"{"type":"response.completed","response":{"status":"completed","usage":{"input_tokens":3,"output_tokens":2,"total_tokens":5}}}"#,
        ]);
        let call = &chunks[0]["candidates"][0]["content"]["parts"][0]["functionCall"];
        assert_eq!(call["name"], json!("ping"));
        assert_eq!(call["args"], json!({"host": "a"}));
        let last = chunks.last().unwrap();
        assert_eq!(last["candidates"][0]["finishReason"], json!("STOP"));
        assert_eq!(last["usageMetadata"]["totalTokenCount"], json!(5));
    }
}

use serde_json::{Value, json};

use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::sse::{render_data, render_done};
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of Responses-API events into OpenAI chat-completion
/// chunks.
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
            state.response_id = event
                .pointer("/response/id")
                .and_then(Value::as_str)
                .unwrap_or("resp")
                .to_string();
            state.model = event
                .pointer("/response/model")
                .and_then(Value::as_str)
                .unwrap_or(&ctx.model)
                .to_string();
            state.created = event
                .pointer("/response/created_at")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            state.message_started = true;
            out.push(render_data(&make_chunk(
                state,
                json!({"role": "assistant", "content": ""}),
                None,
                false,
            )));
        }
        Some("response.output_item.added") => {
            let item = event.get("item").cloned().unwrap_or(Value::Null);
            if item.get("type").and_then(Value::as_str) == Some("function_call") {
                ensure_tool_names(state, ctx);
                let output_index = event
                    .get("output_index")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                let tool_index = state.tool_calls.len() as i64;
                let id = item
                    .get("call_id")
                    .or_else(|| item.get("id"))
                    .and_then(Value::as_str)
                    .unwrap_or("call")
                    .to_string();
                let name = state.tool_names.restore(
                    item.get("name").and_then(Value::as_str).unwrap_or("tool"),
                );
                state.saw_tool_call = true;
                state.tool_calls.insert(
                    output_index,
                    ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: String::new(),
                        block_index: tool_index as u32,
                        started: true,
                        closed: false,
                    },
                );
                out.push(render_data(&make_chunk(
                    state,
                    json!({"tool_calls": [{
                        "index": tool_index,
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": ""},
                    }]}),
                    None,
                    false,
                )));
            }
        }
        Some("response.output_text.delta") => {
            if let Some(delta) = event.get("delta").and_then(Value::as_str) {
                out.push(render_data(&make_chunk(
                    state,
                    json!({"content": delta}),
                    None,
                    false,
                )));
            }
        }
        Some("response.reasoning_summary_text.delta") | Some("response.reasoning_text.delta") => {
            if let Some(delta) = event.get("delta").and_then(Value::as_str) {
                out.push(render_data(&make_chunk(
                    state,
                    json!({"reasoning_content": delta}),
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
                    // the done item carries the authoritative arguments
                    if let Some(arguments) = item.get("arguments").and_then(Value::as_str) {
                        call.arguments = arguments.to_string();
                    }
                    let arguments = repair_json(&call.arguments);
                    let tool_index = call.block_index as i64;
                    out.push(render_data(&make_chunk(
                        state,
                        json!({"tool_calls": [{
                            "index": tool_index,
                            "function": {"arguments": arguments},
                        }]}),
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
    if state.stop_emitted {
        return Vec::new();
    }
    state.stop_emitted = true;
    let mut out = Vec::new();
    if !state.finish_emitted {
        state.finish_emitted = true;
        out.push(render_data(&make_chunk(
            state,
            json!({}),
            Some(finish_reason(state)),
            true,
        )));
    }
    out.push(render_done());
    out
}

fn finish_reason(state: &StreamState) -> String {
    if state.saw_tool_call {
        return "tool_calls".to_string();
    }
    match state.native_finish_reason.as_deref() {
        Some("max_output_tokens") => "length",
        Some("content_filter") => "content_filter",
        _ => "stop",
    }
    .to_string()
}

fn make_chunk(
    state: &StreamState,
    delta: Value,
    finish_reason: Option<String>,
    with_usage: bool,
) -> Value {
    let mut choice = json!({
        "index": 0,
        "delta": delta,
        "finish_reason": finish_reason,
    });
    if choice["finish_reason"].is_string()
        && let Some(native) = &state.native_finish_reason
    {
        choice["native_finish_reason"] = json!(native);
    }

    let mut chunk = json!({
        "id": if state.response_id.is_empty() { "resp" } else { &state.response_id },
        "object": "chat.completion.chunk",
        "created": state.created,
        "model": state.model,
        "choices": [choice],
    });
    if with_usage && let Some(usage) = &state.usage {
        chunk["usage"] = json!({
            "prompt_tokens": usage.input_tokens + usage.cached_tokens,
            "completion_tokens": usage.output_tokens,
            "total_tokens": usage.total_tokens,
            "prompt_tokens_details": {"cached_tokens": usage.cached_tokens},
            "completion_tokens_details": {"reasoning_tokens": usage.reasoning_tokens},
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
        // Responses usage counts cached tokens inside input_tokens.
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
        let ctx = TranslateContext::new(Dialect::OpenAI, Dialect::Codex, "gpt-5-codex");
        let mut state = StreamState::new();
        events
            .iter()
            .flat_map(|event| transform_stream(&ctx, event, &mut state))
            .filter(|line| !line.contains("[DONE]"))
            .map(|line| serde_json::from_str(line.trim_start_matches("data: ").trim()).unwrap())
            .collect()
    }

    #[test]
    fn text_deltas_forward() {
        let chunks = chunks_of(&[
            r#"{"type":"response.created","response":{"id":"resp_1","model":"gpt-5-codex","created_at":7}}"#,
            r#"{"type":"response.output_text.delta","delta":"par","output_index":0}"#,
            r#"{"type":"response.output_text.delta","delta":"tial","output_index":0}"#,
        ]);
        assert_eq!(chunks[0]["choices"][0]["delta"]["role"], json!("assistant"));
        assert_eq!(chunks[0]["created"], json!(7));
        assert_eq!(chunks[1]["choices"][0]["delta"]["content"], json!("par"));
        assert_eq!(chunks[2]["choices"][0]["delta"]["content"], json!("tial"));
    }

    #[test]
    fn function_call_items_round_trip() {
        let chunks = chunks_of(&[
            r#"{"type":"response.created","response":{"id":"resp_2","model":"m"}}"#,
            r#"{"type":"response.output_item.added","output_index":0,"item":{"type":"function_call","call_id":"call_a","name":"probe"}}"#,
            r#"{"type":"response.function_call_arguments.delta","output_index":0,"delta":"{\"x\":"}"#,
            r#"{"type":"response.function_call_arguments.delta","output_index":0,"delta":"2}"}"#,
            r#"{"type":"response.output_item.done","output_index":0,"item":{"type":"function_call","call_id":"call_a","name":"probe","arguments":"{\"x\":2}"}}"#,
            r#"{"type":"response.completed","response":{"status":"completed","usage":{"input_tokens":5,"output_tokens":4,"total_tokens":9}}}"#,
        ]);
        let added = &chunks[1]["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(added["id"], json!("call_a"));
        let done = &chunks[2]["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(done["function"]["arguments"], json!("{\"x\":2}"));
        let last = chunks.last().unwrap();
        assert_eq!(last["choices"][0]["finish_reason"], json!("tool_calls"));
        assert_eq!(last["usage"]["total_tokens"], json!(9));
    }

    #[test]
    fn incomplete_maps_to_length() {
        let chunks = chunks_of(&[
            r#"{"type":"response.created","response":{"id":"r","model":"m"}}"#,
            r#"{"type":"response.incomplete","response":{"status":"incomplete","incomplete_details":{"reason":"max_output_tokens"},"usage":{"input_tokens":1,"output_tokens":1,"total_tokens":2}}}"#,
        ]);
        let last = chunks.last().unwrap();
        assert_eq!(last["choices"][0]["finish_reason"], json!("length"));
        assert_eq!(
            last["choices"][0]["native_finish_reason"],
            json!("max_output_tokens")
        );
    }
}

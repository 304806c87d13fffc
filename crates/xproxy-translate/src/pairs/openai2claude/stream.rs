use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::sse::{render_data, render_done};
use crate::state::{StreamState, ToolCall, Usage};

use xproxy_json::repair_json;

/// Streaming translation of Claude message events into OpenAI chat-completion
/// chunks. One call per upstream SSE data payload; the state object carries
/// block bookkeeping between calls.
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
            record_usage(state, event.pointer("/message/usage"));
            state.message_started = true;
            out.push(render_data(&make_chunk(
                state,
                json!({"role": "assistant", "content": ""}),
                None,
                false,
            )));
        }
        Some("content_block_start") => {
            let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
            if event.pointer("/content_block/type").and_then(Value::as_str) == Some("tool_use") {
                ensure_tool_names(state, ctx);
                let id = event
                    .pointer("/content_block/id")
                    .and_then(Value::as_str)
                    .unwrap_or("tool")
                    .to_string();
                let name = state.tool_names.restore(
                    event
                        .pointer("/content_block/name")
                        .and_then(Value::as_str)
                        .unwrap_or("tool"),
                );
                let tool_index = state.tool_calls.len() as i64;
                state.saw_tool_call = true;
                state.tool_calls.insert(
                    index,
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
        Some("content_block_delta") => {
            let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
            match event.pointer("/delta/type").and_then(Value::as_str) {
                Some("text_delta") => {
                    if let Some(text) = event.pointer("/delta/text").and_then(Value::as_str) {
                        out.push(render_data(&make_chunk(
                            state,
                            json!({"content": text}),
                            None,
                            false,
                        )));
                    }
                }
                Some("thinking_delta") => {
                    if let Some(text) = event.pointer("/delta/thinking").and_then(Value::as_str) {
                        out.push(render_data(&make_chunk(
                            state,
                            json!({"reasoning_content": text}),
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
        Some("message_delta") => {
            record_usage(state, event.get("usage"));
            if let Some(reason) = event.pointer("/delta/stop_reason").and_then(Value::as_str) {
                state.native_finish_reason = Some(reason.to_string());
                out.extend(emit_finish(state));
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
    let mut out = Vec::new();
    if !state.finish_emitted {
        out.extend(emit_finish(state));
    }
    if !state.stop_emitted {
        state.stop_emitted = true;
        out.push(render_done());
    }
    out
}

fn emit_finish(state: &mut StreamState) -> Vec<String> {
    if state.finish_emitted {
        return Vec::new();
    }
    state.finish_emitted = true;
    let chunk = make_chunk(state, json!({}), Some(finish_reason(state)), true);
    vec![render_data(&chunk)]
}

fn finish_reason(state: &StreamState) -> String {
    if state.saw_tool_call {
        return "tool_calls".to_string();
    }
    match state.native_finish_reason.as_deref() {
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        Some("refusal") => "content_filter",
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
    if finish_reason.is_some()
        && let Some(native) = &state.native_finish_reason
    {
        choice["native_finish_reason"] = json!(native);
    }

    let mut chunk = json!({
        "id": if state.response_id.is_empty() { "chatcmpl" } else { &state.response_id },
        "object": "chat.completion.chunk",
        "created": state.created,
        "model": state.model,
        "choices": [choice],
    });
    if with_usage && let Some(usage) = &state.usage {
        chunk["usage"] = usage_json(usage);
    }
    chunk
}

fn record_usage(state: &mut StreamState, usage: Option<&Value>) {
    let Some(usage) = usage else { return };
    let mut current = state.usage.unwrap_or_default();
    if let Some(input) = usage.get("input_tokens").and_then(Value::as_i64) {
        current.input_tokens = input;
    }
    if let Some(output) = usage.get("output_tokens").and_then(Value::as_i64) {
        current.output_tokens = output;
    }
    if let Some(cached) = usage.get("cache_read_input_tokens").and_then(Value::as_i64) {
        current.cached_tokens = cached;
    }
    if let Some(created) = usage
        .get("cache_creation_input_tokens")
        .and_then(Value::as_i64)
    {
        current.cache_creation_tokens = created;
    }
    current.total_tokens = current.input_tokens
        + current.cached_tokens
        + current.cache_creation_tokens
        + current.output_tokens;
    state.usage = Some(current);
}

/// Claude reports non-overlapping input splits; Chat Completions wants cached
/// tokens folded into `prompt_tokens` with the split in the details object.
fn usage_json(usage: &Usage) -> Value {
    let prompt = usage.input_tokens + usage.cached_tokens + usage.cache_creation_tokens;
    json!({
        "prompt_tokens": prompt,
        "completion_tokens": usage.output_tokens,
        "total_tokens": prompt + usage.output_tokens,
        "prompt_tokens_details": {"cached_tokens": usage.cached_tokens},
    })
}

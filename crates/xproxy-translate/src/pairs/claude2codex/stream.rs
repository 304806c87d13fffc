use serde_json::{Value, json};

use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::sse::render_named;
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of Responses-API events into Claude message events.
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
                .unwrap_or("msg")
                .to_string();
            state.model = event
                .pointer("/response/model")
                .and_then(Value::as_str)
                .unwrap_or(&ctx.model)
                .to_string();
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
        Some("response.output_item.added") => {
            let item = event.get("item").cloned().unwrap_or(Value::Null);
            if item.get("type").and_then(Value::as_str) == Some("function_call") {
                ensure_tool_names(state, ctx);
                out.extend(close_content_blocks(state));
                let output_index = event
                    .get("output_index")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                let block_index = state.next_block();
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
                out.push(render_named(
                    "content_block_start",
                    &json!({
                        "type": "content_block_start",
                        "index": block_index,
                        "content_block": {
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": {},
                        },
                    }),
                ));
                state.tool_calls.insert(
                    output_index,
                    ToolCall {
                        id,
                        name,
                        arguments: String::new(),
                        block_index,
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
                out.extend(open_text(state));
                out.push(render_named(
                    "content_block_delta",
                    &json!({
                        "type": "content_block_delta",
                        "index": state.text_block.expect("text block open"),
                        "delta": {"type": "text_delta", "text": delta},
                    }),
                ));
            }
        }
        Some("response.reasoning_summary_text.delta") | Some("response.reasoning_text.delta") => {
            if let Some(delta) = event.get("delta").and_then(Value::as_str)
                && !delta.is_empty()
            {
                out.extend(open_thinking(state));
                out.push(render_named(
                    "content_block_delta",
                    &json!({
                        "type": "content_block_delta",
                        "index": state.thinking_block.expect("thinking block open"),
                        "delta": {"type": "thinking_delta", "thinking": delta},
                    }),
                ));
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
            let output_index = event
                .get("output_index")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            match item.get("type").and_then(Value::as_str) {
                Some("function_call") => {
                    if let Some(call) = state.tool_calls.get_mut(&output_index)
                        && !call.closed
                    {
                        call.closed = true;
                        if let Some(arguments) = item.get("arguments").and_then(Value::as_str) {
                            call.arguments = arguments.to_string();
                        }
                        let arguments = repair_json(&call.arguments);
                        let block_index = call.block_index;
                        out.push(render_named(
                            "content_block_delta",
                            &json!({
                                "type": "content_block_delta",
                                "index": block_index,
                                "delta": {"type": "input_json_delta", "partial_json": arguments},
                            }),
                        ));
                        out.push(render_named(
                            "content_block_stop",
                            &json!({"type": "content_block_stop", "index": block_index}),
                        ));
                    }
                }
                Some("message") => out.extend(close_text(state)),
                Some("reasoning") => out.extend(close_thinking(state)),
                _ => {}
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

fn close_tool_blocks(state: &mut StreamState) -> Vec<String> {
    let mut out = Vec::new();
    let indices: Vec<i64> = state.tool_calls.keys().copied().collect();
    for index in indices {
        let Some(call) = state.tool_calls.get_mut(&index) else {
            continue;
        };
        if call.closed {
            continue;
        }
        call.closed = true;
        let arguments = repair_json(&call.arguments);
        let block_index = call.block_index;
        out.push(render_named(
            "content_block_delta",
            &json!({
                "type": "content_block_delta",
                "index": block_index,
                "delta": {"type": "input_json_delta", "partial_json": arguments},
            }),
        ));
        out.push(render_named(
            "content_block_stop",
            &json!({"type": "content_block_stop", "index": block_index}),
        ));
    }
    out
}

fn finalize(state: &mut StreamState) -> Vec<String> {
    if state.stop_emitted {
        return Vec::new();
    }
    state.stop_emitted = true;
    state.finish_emitted = true;

    let mut out = close_content_blocks(state);
    out.extend(close_tool_blocks(state));
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
        Some("max_output_tokens") => "max_tokens",
        Some("failed") => "refusal",
        _ => "end_turn",
    }
}

fn record_usage(state: &mut StreamState, usage: Option<&Value>) {
    let Some(usage) = usage else { return };
    let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
    let cached = usage
        .pointer("/input_tokens_details/cached_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    state.usage = Some(Usage {
        input_tokens: input - cached,
        output_tokens: usage
            .get("output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: usage
            .pointer("/output_tokens_details/reasoning_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        total_tokens: usage.get("total_tokens").and_then(Value::as_i64).unwrap_or(0),
    });
}

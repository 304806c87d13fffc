use serde_json::{Value, json};

use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::sse::render_named;
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of Claude message events into Responses-API events.
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
            state.message_started = true;
            state.response_id = format!(
                "resp_{}",
                event
                    .pointer("/message/id")
                    .and_then(Value::as_str)
                    .unwrap_or("msg")
            );
            state.model = event
                .pointer("/message/model")
                .and_then(Value::as_str)
                .unwrap_or(&ctx.model)
                .to_string();
            record_start_usage(state, event.pointer("/message/usage"));
            let created =
                json!({"response": response_doc(state, "in_progress", Vec::new(), false)});
            out.push(emit(state, "response.created", created));
        }
        Some("content_block_start") => {
            let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
            match event.pointer("/content_block/type").and_then(Value::as_str) {
                Some("tool_use") => {
                    ensure_tool_names(state, ctx);
                    out.extend(close_message_items(state));
                    let output_index = state.output_index;
                    state.output_index += 1;
                    let id = event
                        .pointer("/content_block/id")
                        .and_then(Value::as_str)
                        .unwrap_or("call")
                        .to_string();
                    let name = state.tool_names.restore(
                        event
                            .pointer("/content_block/name")
                            .and_then(Value::as_str)
                            .unwrap_or("tool"),
                    );
                    state.saw_tool_call = true;
                    state.tool_calls.insert(
                        index,
                        ToolCall {
                            id: id.clone(),
                            name: name.clone(),
                            arguments: String::new(),
                            block_index: output_index as u32,
                            started: true,
                            closed: false,
                        },
                    );
                    out.push(emit(
                        state,
                        "response.output_item.added",
                        json!({
                            "output_index": output_index,
                            "item": {
                                "type": "function_call",
                                "id": format!("fc_{output_index}"),
                                "call_id": id,
                                "name": name,
                                "arguments": "",
                            },
                        }),
                    ));
                }
                _ => {}
            }
        }
        Some("content_block_delta") => {
            let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
            match event.pointer("/delta/type").and_then(Value::as_str) {
                Some("text_delta") => {
                    if let Some(text) = event.pointer("/delta/text").and_then(Value::as_str) {
                        out.extend(open_message_item(state));
                        state.text.push_str(text);
                        let item_id = message_item_id(state);
                        let delta = json!({
                            "item_id": item_id,
                            "output_index": state.text_block.unwrap_or(0),
                            "content_index": 0,
                            "delta": text,
                        });
                        out.push(emit(state, "response.output_text.delta", delta));
                    }
                }
                Some("thinking_delta") => {
                    if let Some(text) = event.pointer("/delta/thinking").and_then(Value::as_str) {
                        out.extend(open_reasoning_item(state));
                        state.thinking.push_str(text);
                        let item_id = reasoning_item_id(state);
                        let delta = json!({
                            "item_id": item_id,
                            "output_index": state.thinking_block.unwrap_or(0),
                            "delta": text,
                        });
                        out.push(emit(state, "response.reasoning_summary_text.delta", delta));
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
            if state.tool_calls.contains_key(&index) {
                out.extend(close_tool_item(state, index));
            } else {
                out.extend(close_message_items(state));
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

fn message_item_id(state: &StreamState) -> String {
    format!("msg_{}", state.response_id)
}

fn reasoning_item_id(state: &StreamState) -> String {
    format!("rs_{}", state.response_id)
}

fn open_message_item(state: &mut StreamState) -> Vec<String> {
    let mut out = close_reasoning_item(state);
    if state.text_block.is_none() {
        let output_index = state.output_index;
        state.output_index += 1;
        state.text_block = Some(output_index as u32);
        let item_id = message_item_id(state);
        out.push(emit(
            state,
            "response.output_item.added",
            json!({
                "output_index": output_index,
                "item": {
                    "type": "message",
                    "id": item_id,
                    "status": "in_progress",
                    "role": "assistant",
                    "content": [],
                },
            }),
        ));
    }
    out
}

fn open_reasoning_item(state: &mut StreamState) -> Vec<String> {
    let mut out = close_text_item(state);
    if state.thinking_block.is_none() {
        let output_index = state.output_index;
        state.output_index += 1;
        state.thinking_block = Some(output_index as u32);
        let item_id = reasoning_item_id(state);
        out.push(emit(
            state,
            "response.output_item.added",
            json!({
                "output_index": output_index,
                "item": {"type": "reasoning", "id": item_id, "summary": []},
            }),
        ));
    }
    out
}

fn close_text_item(state: &mut StreamState) -> Vec<String> {
    let Some(output_index) = state.text_block.take() else {
        return Vec::new();
    };
    let item_id = message_item_id(state);
    let text = state.text.clone();
    let text_done = json!({
        "item_id": item_id,
        "output_index": output_index,
        "content_index": 0,
        "text": text,
    });
    let item_done = json!({"output_index": output_index, "item": message_item(state)});
    vec![
        emit(state, "response.output_text.done", text_done),
        emit(state, "response.output_item.done", item_done),
    ]
}

fn close_reasoning_item(state: &mut StreamState) -> Vec<String> {
    let Some(output_index) = state.thinking_block.take() else {
        return Vec::new();
    };
    let item_done = json!({"output_index": output_index, "item": reasoning_item(state)});
    vec![emit(state, "response.output_item.done", item_done)]
}

fn close_message_items(state: &mut StreamState) -> Vec<String> {
    let mut out = close_text_item(state);
    out.extend(close_reasoning_item(state));
    out
}

fn close_tool_item(state: &mut StreamState, index: i64) -> Vec<String> {
    let Some(call) = state.tool_calls.get_mut(&index) else {
        return Vec::new();
    };
    if call.closed {
        return Vec::new();
    }
    call.closed = true;
    let arguments = repair_json(&call.arguments);
    call.arguments = arguments.clone();
    let output_index = call.block_index as i64;
    let call_id = call.id.clone();
    let name = call.name.clone();
    vec![
        emit(
            state,
            "response.function_call_arguments.done",
            json!({
                "item_id": format!("fc_{output_index}"),
                "output_index": output_index,
                "arguments": arguments,
            }),
        ),
        emit(
            state,
            "response.output_item.done",
            json!({
                "output_index": output_index,
                "item": {
                    "type": "function_call",
                    "id": format!("fc_{output_index}"),
                    "call_id": call_id,
                    "name": name,
                    "arguments": arguments,
                    "status": "completed",
                },
            }),
        ),
    ]
}

fn message_item(state: &StreamState) -> Value {
    json!({
        "type": "message",
        "id": message_item_id(state),
        "status": "completed",
        "role": "assistant",
        "content": [{"type": "output_text", "text": state.text}],
    })
}

fn reasoning_item(state: &StreamState) -> Value {
    json!({
        "type": "reasoning",
        "id": reasoning_item_id(state),
        "summary": [{"type": "summary_text", "text": state.thinking}],
    })
}

fn finalize(state: &mut StreamState) -> Vec<String> {
    if state.stop_emitted {
        return Vec::new();
    }
    state.stop_emitted = true;
    state.finish_emitted = true;

    let mut out = close_message_items(state);
    let open: Vec<i64> = state
        .tool_calls
        .iter()
        .filter(|(_, call)| !call.closed)
        .map(|(index, _)| *index)
        .collect();
    for index in open {
        out.extend(close_tool_item(state, index));
    }

    let incomplete = matches!(state.native_finish_reason.as_deref(), Some("max_tokens"));
    let status = if incomplete { "incomplete" } else { "completed" };
    let output = assembled_output(state);
    let event_name = if incomplete {
        "response.incomplete"
    } else {
        "response.completed"
    };
    let terminal = json!({"response": response_doc(state, status, output, true)});
    out.push(emit(state, event_name, terminal));
    out
}

fn assembled_output(state: &StreamState) -> Vec<Value> {
    let mut output = Vec::new();
    if !state.thinking.is_empty() {
        output.push(reasoning_item(state));
    }
    if !state.text.is_empty() {
        output.push(message_item(state));
    }
    for call in state.tool_calls.values() {
        output.push(json!({
            "type": "function_call",
            "id": format!("fc_{}", call.block_index),
            "call_id": call.id,
            "name": call.name,
            "arguments": call.arguments,
            "status": "completed",
        }));
    }
    output
}

fn response_doc(state: &StreamState, status: &str, output: Vec<Value>, with_usage: bool) -> Value {
    let mut doc = json!({
        "id": state.response_id,
        "object": "response",
        "created_at": state.created,
        "model": state.model,
        "status": status,
        "output": output,
    });
    if status == "incomplete" {
        doc["incomplete_details"] = json!({"reason": "max_output_tokens"});
    }
    if with_usage && let Some(usage) = &state.usage {
        doc["usage"] = json!({
            "input_tokens": usage.input_tokens + usage.cached_tokens,
            "input_tokens_details": {"cached_tokens": usage.cached_tokens},
            "output_tokens": usage.output_tokens,
            "output_tokens_details": {"reasoning_tokens": usage.reasoning_tokens},
            "total_tokens": usage.input_tokens + usage.cached_tokens + usage.output_tokens,
        });
    }
    doc
}

fn emit(state: &mut StreamState, event: &str, mut data: Value) -> String {
    data["type"] = json!(event);
    data["sequence_number"] = json!(state.next_sequence());
    render_named(event, &data)
}

fn record_start_usage(state: &mut StreamState, usage: Option<&Value>) {
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
    if let Some(input) = usage.get("input_tokens").and_then(Value::as_i64) {
        current.input_tokens = input;
    }
    if let Some(cached) = usage.get("cache_read_input_tokens").and_then(Value::as_i64) {
        current.cached_tokens = cached;
    }
    if let Some(output) = usage.get("output_tokens").and_then(Value::as_i64) {
        current.output_tokens = output;
    }
    state.usage = Some(current);
}

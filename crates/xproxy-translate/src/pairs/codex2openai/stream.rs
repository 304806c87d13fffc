use serde_json::{Value, json};

use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::sse::render_named;
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of OpenAI chat-completion chunks into Responses-API
/// events. Text, reasoning and each function call become their own output
/// items; the terminal `response.completed` carries the assembled response
/// document.
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
        state.response_id = format!(
            "resp_{}",
            event.get("id").and_then(Value::as_str).unwrap_or("stream")
        );
        state.model = event
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&ctx.model)
            .to_string();
        state.created = event.get("created").and_then(Value::as_i64).unwrap_or(0);
        let created = json!({"response": response_doc(state, "in_progress", Vec::new(), false)});
        out.push(emit(state, "response.created", created));
    }

    record_usage(state, event.get("usage"));

    let choice = event.pointer("/choices/0").cloned().unwrap_or(Value::Null);

    if let Some(text) = choice.pointer("/delta/content").and_then(Value::as_str)
        && !text.is_empty()
    {
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

    if let Some(reasoning) = choice
        .pointer("/delta/reasoning_content")
        .and_then(Value::as_str)
        && !reasoning.is_empty()
    {
        out.extend(open_reasoning_item(state));
        state.thinking.push_str(reasoning);
        let item_id = reasoning_item_id(state);
        let delta = json!({
            "item_id": item_id,
            "output_index": state.thinking_block.unwrap_or(0),
            "delta": reasoning,
        });
        out.push(emit(state, "response.reasoning_summary_text.delta", delta));
    }

    if let Some(calls) = choice.pointer("/delta/tool_calls").and_then(Value::as_array) {
        out.extend(close_message_items(state));
        ensure_tool_names(state, ctx);
        state.saw_tool_call = true;
        for call in calls {
            let index = call.get("index").and_then(Value::as_i64).unwrap_or(0);
            if !state.tool_calls.contains_key(&index) {
                let output_index = state.output_index;
                state.output_index += 1;
                let id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{index}"));
                let name = state.tool_names.restore(
                    call.pointer("/function/name")
                        .and_then(Value::as_str)
                        .unwrap_or("tool"),
                );
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
            if let Some(fragment) = call.pointer("/function/arguments").and_then(Value::as_str)
                && let Some(tool) = state.tool_calls.get_mut(&index)
            {
                tool.arguments.push_str(fragment);
            }
        }
    }

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        state.native_finish_reason = Some(reason.to_string());
        if state.usage.is_some() {
            out.extend(finalize(state));
        }
    } else if state.native_finish_reason.is_some() && state.usage.is_some() {
        out.extend(finalize(state));
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
    let item_done = json!({
        "output_index": output_index,
        "item": message_item(state),
    });
    vec![
        emit(state, "response.output_text.done", text_done),
        emit(state, "response.output_item.done", item_done),
    ]
}

fn close_reasoning_item(state: &mut StreamState) -> Vec<String> {
    let Some(output_index) = state.thinking_block.take() else {
        return Vec::new();
    };
    let item_done = json!({
        "output_index": output_index,
        "item": reasoning_item(state),
    });
    vec![emit(state, "response.output_item.done", item_done)]
}

fn close_message_items(state: &mut StreamState) -> Vec<String> {
    let mut out = close_text_item(state);
    out.extend(close_reasoning_item(state));
    out
}

fn close_tool_items(state: &mut StreamState) -> Vec<String> {
    let mut out = Vec::new();
    let indices: Vec<i64> = state.tool_calls.keys().copied().collect();
    for index in indices {
        let Some(tool) = state.tool_calls.get(&index) else {
            continue;
        };
        if tool.closed {
            continue;
        }
        let output_index = tool.block_index as i64;
        let arguments = repair_json(&tool.arguments);
        let call_id = tool.id.clone();
        let name = tool.name.clone();
        out.push(emit(
            state,
            "response.function_call_arguments.done",
            json!({
                "item_id": format!("fc_{output_index}"),
                "output_index": output_index,
                "arguments": arguments,
            }),
        ));
        out.push(emit(
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
        ));
        if let Some(tool) = state.tool_calls.get_mut(&index) {
            tool.closed = true;
            tool.arguments = arguments;
        }
    }
    out
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
    out.extend(close_tool_items(state));

    let incomplete = matches!(state.native_finish_reason.as_deref(), Some("length"));
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
    for tool in state.tool_calls.values() {
        output.push(json!({
            "type": "function_call",
            "id": format!("fc_{}", tool.block_index),
            "call_id": tool.id,
            "name": tool.name,
            "arguments": tool.arguments,
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
            "total_tokens": usage.total_tokens,
        });
    }
    doc
}

fn emit(state: &mut StreamState, event: &str, mut data: Value) -> String {
    data["type"] = json!(event);
    data["sequence_number"] = json!(state.next_sequence());
    render_named(event, &data)
}

fn record_usage(state: &mut StreamState, usage: Option<&Value>) {
    let Some(usage) = usage else { return };
    if usage.is_null() {
        return;
    }
    let prompt = usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0);
    let cached = usage
        .pointer("/prompt_tokens_details/cached_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    state.usage = Some(Usage {
        input_tokens: prompt - cached,
        output_tokens: usage
            .get("completion_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: usage
            .pointer("/completion_tokens_details/reasoning_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        total_tokens: usage.get("total_tokens").and_then(Value::as_i64).unwrap_or(0),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    fn events_of(chunks: &[&str]) -> Vec<(String, Value)> {
        let ctx = TranslateContext::new(Dialect::Codex, Dialect::OpenAI, "gpt-5");
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
    fn sequence_numbers_are_monotonic() {
        let events = events_of(&[
            r#"{"id":"c1","model":"gpt-5","choices":[{"index":0,"delta":{"content":"a"}}]}"#,
            r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"b"}}]}"#,
            r#"{"id":"c1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#,
        ]);
        let sequences: Vec<i64> = events
            .iter()
            .map(|(_, data)| data["sequence_number"].as_i64().unwrap())
            .collect();
        for window in sequences.windows(2) {
            assert!(window[1] > window[0]);
        }
        let (last_name, last) = events.last().unwrap();
        assert_eq!(last_name, "response.completed");
        assert_eq!(last["response"]["output"][0]["content"][0]["text"], json!("ab"));
        assert_eq!(last["response"]["usage"]["total_tokens"], json!(2));
    }

    #[test]
    fn tool_calls_become_function_call_items() {
        let events = events_of(&[
            r#"{"id":"c2","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_b","function":{"name":"go","arguments":"{\"n\""}}]}}]}"#,
            r#"{"id":"c2","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":":3}"}}]}}]}"#,
            r#"{"id":"c2","choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#,
        ]);
        let added = events
            .iter()
            .find(|(name, _)| name == "response.output_item.added")
            .unwrap();
        assert_eq!(added.1["item"]["call_id"], json!("call_b"));
        let done = events
            .iter()
            .find(|(name, _)| name == "response.function_call_arguments.done")
            .unwrap();
        assert_eq!(done.1["arguments"], json!("{\"n\":3}"));
        let (_, completed) = events.last().unwrap();
        assert_eq!(completed["response"]["status"], json!("completed"));
        assert_eq!(
            completed["response"]["output"][0]["type"],
            json!("function_call")
        );
    }

    #[test]
    fn length_finish_yields_incomplete() {
        let events = events_of(&[
            r#"{"id":"c3","choices":[{"index":0,"delta":{"content":"t"}}]}"#,
            r#"{"id":"c3","choices":[{"index":0,"delta":{},"finish_reason":"length"}],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#,
        ]);
        let (name, data) = events.last().unwrap();
        assert_eq!(name, "response.incomplete");
        assert_eq!(
            data["response"]["incomplete_details"]["reason"],
            json!("max_output_tokens")
        );
    }
}

use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{args_string, ensure_tool_names};
use crate::sse::render_named;
use crate::state::{StreamState, ToolCall, Usage};
use crate::tool_ids::mint_tool_id;

/// Streaming translation of Gemini generate-content chunks into
/// Responses-API events. Each Gemini function call arrives whole and becomes
/// a complete function_call item on the spot.
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
            event
                .get("responseId")
                .and_then(Value::as_str)
                .unwrap_or("stream")
        );
        state.model = event
            .get("modelVersion")
            .and_then(Value::as_str)
            .map(|model| model.strip_prefix("models/").unwrap_or(model).to_string())
            .unwrap_or_else(|| ctx.model.clone());
        let created = json!({"response": response_doc(state, "in_progress", Vec::new(), false)});
        out.push(emit(state, "response.created", created));
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
            out.extend(open_reasoning_item(state));
            state.thinking.push_str(text);
            let item_id = reasoning_item_id(state);
            let delta = json!({
                "item_id": item_id,
                "output_index": state.thinking_block.unwrap_or(0),
                "delta": text,
            });
            out.push(emit(state, "response.reasoning_summary_text.delta", delta));
        } else {
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

    if let Some(call) = part.get("functionCall") {
        ensure_tool_names(state, ctx);
        out.extend(close_message_items(state));
        state.saw_tool_call = true;
        let output_index = state.output_index;
        state.output_index += 1;
        let call_id = call
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(mint_tool_id);
        let name = state
            .tool_names
            .restore(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
        let arguments = args_string(call.get("args").unwrap_or(&Value::Null));
        state.tool_calls.insert(
            output_index,
            ToolCall {
                id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
                block_index: output_index as u32,
                started: true,
                closed: true,
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
                    "call_id": call_id,
                    "name": name,
                    "arguments": "",
                },
            }),
        ));
        out.push(emit(
            state,
            "response.function_call_arguments.done",
            json!({
                "item_id": format!("fc_{output_index}"),
                "output_index": output_index,
                "arguments": arguments,
            }),
        ));
        let item = function_call_item(output_index, &state.tool_calls[&output_index]);
        out.push(emit(
            state,
            "response.output_item.done",
            json!({"output_index": output_index, "item": item}),
        ));
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

fn function_call_item(output_index: i64, call: &ToolCall) -> Value {
    json!({
        "type": "function_call",
        "id": format!("fc_{output_index}"),
        "call_id": call.id,
        "name": call.name,
        "arguments": call.arguments,
        "status": "completed",
    })
}

fn finalize(state: &mut StreamState) -> Vec<String> {
    if state.stop_emitted {
        return Vec::new();
    }
    state.stop_emitted = true;
    state.finish_emitted = true;

    let mut out = close_message_items(state);

    let incomplete = matches!(state.native_finish_reason.as_deref(), Some("MAX_TOKENS"));
    let status = if incomplete { "incomplete" } else { "completed" };
    let mut output = Vec::new();
    if !state.thinking.is_empty() {
        output.push(reasoning_item(state));
    }
    if !state.text.is_empty() {
        output.push(message_item(state));
    }
    for (index, call) in &state.tool_calls {
        output.push(function_call_item(*index, call));
    }
    let event_name = if incomplete {
        "response.incomplete"
    } else {
        "response.completed"
    };
    let terminal = json!({"response": response_doc(state, status, output, true)});
    out.push(emit(state, event_name, terminal));
    out
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
    let prompt = usage
        .get("promptTokenCount")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let cached = usage
        .get("cachedContentTokenCount")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let output = usage
        .get("candidatesTokenCount")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    state.usage = Some(Usage {
        input_tokens: prompt - cached,
        output_tokens: output,
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: usage
            .get("thoughtsTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        total_tokens: usage
            .get("totalTokenCount")
            .and_then(Value::as_i64)
            .unwrap_or(prompt + output),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    fn events_of(chunks: &[&str]) -> Vec<(String, Value)> {
        let ctx = TranslateContext::new(Dialect::Codex, Dialect::Gemini, "gemini-2.5-pro");
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
    fn function_call_becomes_complete_item() {
        let events = events_of(&[
            r#"{"responseId":"r1","candidates":[{"content":{"parts":[{"functionCall":{"name":"grab","args":{"w":4}}}]},"index":0}]}"#,
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP","index":0}],"usageMetadata":{"promptTokenCount":2,"candidatesTokenCount":1,"totalTokenCount":3}}"#,
        ]);
        let added = events
            .iter()
            .find(|(name, _)| name == "response.output_item.added")
            .unwrap();
        assert!(
            added.1["item"]["call_id"]
                .as_str()
                .unwrap()
                .starts_with("toolu_")
        );
        let done = events
            .iter()
            .find(|(name, _)| name == "response.function_call_arguments.done")
            .unwrap();
        assert_eq!(done.1["arguments"], json!("{\"w\":4}"));
        let (last_name, last) = events.last().unwrap();
        assert_eq!(last_name, "response.completed");
        assert_eq!(last["response"]["output"][0]["type"], json!("function_call"));
    }

    #[test]
    fn text_accumulates_into_message_item() {
        let events = events_of(&[
            r#"{"responseId":"r2","candidates":[{"content":{"parts":[{"text":"one "}]},"index":0}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"two"}]},"finishReason":"MAX_TOKENS","index":0}],"usageMetadata":{"promptTokenCount":1,"candidatesTokenCount":1,"totalTokenCount":2}}"#,
        ]);
        let (last_name, last) = events.last().unwrap();
        assert_eq!(last_name, "response.incomplete");
        assert_eq!(
            last["response"]["output"][0]["content"][0]["text"],
            json!("one two")
        );
    }
}

use serde_json::{Value, json};

use xproxy_json::repair_json;

use crate::context::TranslateContext;
use crate::pairs::util::ensure_tool_names;
use crate::sse::render_named;
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of OpenAI chat-completion chunks into Claude message
/// events. Text, reasoning and tool calls each get their own content block;
/// tool arguments are reassembled and emitted complete when their block
/// closes.
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
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("msg")
            .to_string();
        state.model = event
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&ctx.model)
            .to_string();
        state.created = event.get("created").and_then(Value::as_i64).unwrap_or(0);
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

    record_usage(state, event.get("usage"));

    let choice = event
        .pointer("/choices/0")
        .cloned()
        .unwrap_or(Value::Null);

    if let Some(text) = choice.pointer("/delta/content").and_then(Value::as_str)
        && !text.is_empty()
    {
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

    if let Some(reasoning) = choice
        .pointer("/delta/reasoning_content")
        .and_then(Value::as_str)
        && !reasoning.is_empty()
    {
        out.extend(open_thinking(state));
        out.push(render_named(
            "content_block_delta",
            &json!({
                "type": "content_block_delta",
                "index": state.thinking_block.expect("thinking block open"),
                "delta": {"type": "thinking_delta", "thinking": reasoning},
            }),
        ));
    }

    if let Some(calls) = choice.pointer("/delta/tool_calls").and_then(Value::as_array) {
        out.extend(close_text_blocks(state));
        for call in calls {
            out.extend(handle_tool_delta(ctx, state, call));
        }
    }

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        state.native_finish_reason = Some(reason.to_string());
        out.extend(close_all_blocks(state));
        if state.usage.is_some() {
            out.extend(finalize(state));
        }
    } else if state.native_finish_reason.is_some() && state.usage.is_some() {
        // usage-only chunk that followed the finish chunk
        out.extend(finalize(state));
    }

    out
}

fn handle_tool_delta(
    ctx: &TranslateContext,
    state: &mut StreamState,
    call: &Value,
) -> Vec<String> {
    let mut out = Vec::new();
    let index = call.get("index").and_then(Value::as_i64).unwrap_or(0);

    if !state.tool_calls.contains_key(&index) {
        ensure_tool_names(state, ctx);
        let block_index = state.next_block();
        let id = call
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("toolcall-{index}"));
        let name = state.tool_names.restore(
            call.pointer("/function/name")
                .and_then(Value::as_str)
                .unwrap_or("tool"),
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
            index,
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

    if let Some(fragment) = call
        .pointer("/function/arguments")
        .and_then(Value::as_str)
        && let Some(tool) = state.tool_calls.get_mut(&index)
    {
        tool.arguments.push_str(fragment);
    }

    out
}

fn open_text(state: &mut StreamState) -> Vec<String> {
    let mut out = close_thinking_block(state);
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
    let mut out = close_text_block(state);
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

fn close_text_block(state: &mut StreamState) -> Vec<String> {
    match state.text_block.take() {
        Some(index) => vec![render_named(
            "content_block_stop",
            &json!({"type": "content_block_stop", "index": index}),
        )],
        None => Vec::new(),
    }
}

fn close_thinking_block(state: &mut StreamState) -> Vec<String> {
    match state.thinking_block.take() {
        Some(index) => vec![render_named(
            "content_block_stop",
            &json!({"type": "content_block_stop", "index": index}),
        )],
        None => Vec::new(),
    }
}

fn close_text_blocks(state: &mut StreamState) -> Vec<String> {
    let mut out = close_text_block(state);
    out.extend(close_thinking_block(state));
    out
}

fn close_all_blocks(state: &mut StreamState) -> Vec<String> {
    let mut out = close_text_blocks(state);
    let indices: Vec<i64> = state.tool_calls.keys().copied().collect();
    for index in indices {
        let Some(tool) = state.tool_calls.get_mut(&index) else {
            continue;
        };
        if tool.closed {
            continue;
        }
        tool.closed = true;
        let block_index = tool.block_index;
        let arguments = repair_json(&tool.arguments);
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
    let mut out = Vec::new();
    if !state.finish_emitted {
        out.extend(close_all_blocks(state));
        state.finish_emitted = true;
        let usage = state.usage.unwrap_or_default();
        out.push(render_named(
            "message_delta",
            &json!({
                "type": "message_delta",
                "delta": {"stop_reason": stop_reason(state), "stop_sequence": null},
                "usage": usage_json(&usage),
            }),
        ));
    }
    state.stop_emitted = true;
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
        Some("length") => "max_tokens",
        Some("tool_calls") | Some("function_call") => "tool_use",
        Some("content_filter") => "refusal",
        _ => "end_turn",
    }
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
    let output = usage
        .get("completion_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let reasoning = usage
        .pointer("/completion_tokens_details/reasoning_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    state.usage = Some(Usage {
        // prompt_tokens includes the cached share; Claude reports them
        // disjoint, so subtract to keep input_tokens non-overlapping.
        input_tokens: prompt - cached,
        output_tokens: output,
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: reasoning,
        total_tokens: prompt + output,
    });
}

fn usage_json(usage: &Usage) -> Value {
    json!({
        "input_tokens": usage.input_tokens,
        "output_tokens": usage.output_tokens,
        "cache_read_input_tokens": usage.cached_tokens,
    })
}

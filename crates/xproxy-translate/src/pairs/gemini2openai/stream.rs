use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{ensure_tool_names, parse_args};
use crate::sse::render_data;
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of OpenAI chat-completion chunks into Gemini
/// generate-content chunks. Tool-call argument fragments are reassembled and
/// surfaced as complete `functionCall` parts when the upstream finishes.
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

    if state.response_id.is_empty()
        && let Some(id) = event.get("id").and_then(Value::as_str)
    {
        state.response_id = id.to_string();
    }
    if state.model.is_empty() {
        state.model = event
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&ctx.model)
            .to_string();
    }
    record_usage(state, event.get("usage"));

    let choice = event.pointer("/choices/0").cloned().unwrap_or(Value::Null);
    let mut parts: Vec<Value> = Vec::new();

    if let Some(text) = choice.pointer("/delta/content").and_then(Value::as_str)
        && !text.is_empty()
    {
        parts.push(json!({"text": text}));
    }
    if let Some(reasoning) = choice
        .pointer("/delta/reasoning_content")
        .and_then(Value::as_str)
        && !reasoning.is_empty()
    {
        parts.push(json!({"text": reasoning, "thought": true}));
    }

    if let Some(calls) = choice.pointer("/delta/tool_calls").and_then(Value::as_array) {
        ensure_tool_names(state, ctx);
        state.saw_tool_call = true;
        for call in calls {
            let index = call.get("index").and_then(Value::as_i64).unwrap_or(0);
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let entry = state.tool_calls.entry(index).or_insert_with(|| ToolCall {
                id,
                name: String::new(),
                arguments: String::new(),
                block_index: index as u32,
                started: true,
                closed: false,
            });
            if let Some(name) = call.pointer("/function/name").and_then(Value::as_str)
                && entry.name.is_empty()
            {
                entry.name = name.to_string();
            }
            if let Some(fragment) = call.pointer("/function/arguments").and_then(Value::as_str) {
                entry.arguments.push_str(fragment);
            }
        }
    }

    let mut out = Vec::new();
    if !parts.is_empty() {
        out.push(render_data(&make_chunk(state, parts, None, false)));
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

fn finalize(state: &mut StreamState) -> Vec<String> {
    if state.finish_emitted {
        return Vec::new();
    }
    state.finish_emitted = true;
    state.stop_emitted = true;

    let mut parts: Vec<Value> = Vec::new();
    for call in state.take_tool_calls() {
        let name = state.tool_names.restore(&call.name);
        parts.push(json!({
            "functionCall": {"name": name, "args": parse_args(&call.arguments)},
        }));
    }

    let reason = finish_reason(state);
    vec![render_data(&make_chunk(state, parts, Some(reason), true))]
}

fn finish_reason(state: &StreamState) -> &'static str {
    // Gemini reports completed tool calls with a plain STOP.
    if state.saw_tool_call {
        return "STOP";
    }
    match state.native_finish_reason.as_deref() {
        Some("length") => "MAX_TOKENS",
        Some("content_filter") => "SAFETY",
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
    state.usage = Some(Usage {
        input_tokens: prompt - cached,
        output_tokens: output,
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: usage
            .pointer("/completion_tokens_details/reasoning_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        total_tokens: prompt + output,
    });
}

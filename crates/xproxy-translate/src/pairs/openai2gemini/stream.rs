use serde_json::{Value, json};

use crate::context::TranslateContext;
use crate::pairs::util::{args_string, ensure_tool_names};
use crate::sse::{render_data, render_done};
use crate::state::{StreamState, ToolCall, Usage};

/// Streaming translation of Gemini generate-content chunks into OpenAI
/// chat-completion chunks. Gemini delivers each function call whole, so the
/// accumulator mostly assigns stable tool indices and keeps the terminal
/// reason honest.
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

    if let Some(id) = event.get("responseId").and_then(Value::as_str) {
        state.response_id = id.to_string();
    }
    if let Some(model) = event.get("modelVersion").and_then(Value::as_str) {
        state.model = model.strip_prefix("models/").unwrap_or(model).to_string();
    } else if state.model.is_empty() {
        state.model = ctx.model.clone();
    }
    record_usage(state, event.get("usageMetadata"));

    let mut out = Vec::new();

    if !state.message_started {
        state.message_started = true;
        out.push(render_data(&make_chunk(
            state,
            json!({"role": "assistant", "content": ""}),
            None,
            false,
        )));
    }

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
        let delta = if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
            json!({"reasoning_content": text})
        } else {
            json!({"content": text})
        };
        out.push(render_data(&make_chunk(state, delta, None, false)));
    }

    if let Some(call) = part.get("functionCall") {
        ensure_tool_names(state, ctx);
        let tool_index = state.tool_calls.len() as i64;
        let id = call
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("call_{}_{tool_index}", state.response_id));
        let name = state
            .tool_names
            .restore(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
        let arguments = args_string(call.get("args").unwrap_or(&Value::Null));
        state.saw_tool_call = true;
        state.tool_calls.insert(
            tool_index,
            ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
                block_index: tool_index as u32,
                started: true,
                closed: true,
            },
        );
        out.push(render_data(&make_chunk(
            state,
            json!({"tool_calls": [{
                "index": tool_index,
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": arguments},
            }]}),
            None,
            false,
        )));
    }

    if let Some(data) = part.get("inlineData")
        && let Some(mime) = data.get("mimeType").and_then(Value::as_str)
    {
        out.push(render_data(&make_chunk(
            state,
            json!({"content": format!("[inline {mime} data]")}),
            None,
            false,
        )));
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
        Some("MAX_TOKENS") => "length",
        Some("SAFETY") | Some("RECITATION") | Some("PROHIBITED_CONTENT") | Some("SPII")
        | Some("BLOCKLIST") => "content_filter",
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
        choice["native_finish_reason"] = json!(native.to_ascii_lowercase());
    }

    let mut chunk = json!({
        "id": if state.response_id.is_empty() { "response" } else { &state.response_id },
        "object": "chat.completion.chunk",
        "created": state.created,
        "model": state.model,
        "choices": [choice],
    });
    if with_usage && let Some(usage) = &state.usage {
        let prompt = usage.input_tokens + usage.cached_tokens;
        chunk["usage"] = json!({
            "prompt_tokens": prompt,
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
    let reasoning = usage
        .get("thoughtsTokenCount")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let total = usage
        .get("totalTokenCount")
        .and_then(Value::as_i64)
        .unwrap_or(prompt + output);
    state.usage = Some(Usage {
        // Gemini's prompt count already includes the cached share.
        input_tokens: prompt - cached,
        output_tokens: output,
        cached_tokens: cached,
        cache_creation_tokens: 0,
        reasoning_tokens: reasoning,
        total_tokens: total,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use xproxy_common::Dialect;

    fn chunks_of(events: &[&str]) -> Vec<Value> {
        let ctx = TranslateContext::new(Dialect::OpenAI, Dialect::Gemini, "gemini-2.5-pro");
        let mut state = StreamState::new();
        events
            .iter()
            .flat_map(|event| transform_stream(&ctx, event, &mut state))
            .filter(|line| !line.contains("[DONE]"))
            .map(|line| serde_json::from_str(line.trim_start_matches("data: ").trim()).unwrap())
            .collect()
    }

    #[test]
    fn text_and_thought_parts_split_streams() {
        let chunks = chunks_of(&[
            r#"{"responseId":"r1","modelVersion":"models/gemini-2.5-pro","candidates":[{"content":{"parts":[{"text":"mull","thought":true}]},"index":0}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"answer"}]},"index":0}]}"#,
        ]);
        assert_eq!(chunks[0]["choices"][0]["delta"]["role"], json!("assistant"));
        assert_eq!(
            chunks[1]["choices"][0]["delta"]["reasoning_content"],
            json!("mull")
        );
        assert_eq!(chunks[2]["choices"][0]["delta"]["content"], json!("answer"));
        assert_eq!(chunks[0]["model"], json!("gemini-2.5-pro"));
    }

    #[test]
    fn tool_call_then_max_tokens_forces_tool_reason() {
        // chunk 1 carries the call, chunk 2 only the finish reason
        let chunks = chunks_of(&[
            r#"{"responseId":"r2","candidates":[{"content":{"parts":[{"functionCall":{"name":"lookup","args":{"q":"x"}}}]},"index":0}]}"#,
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"MAX_TOKENS","index":0}],"usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2,"totalTokenCount":6}}"#,
        ]);
        let call = &chunks[1]["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(call["function"]["name"], json!("lookup"));
        assert_eq!(call["function"]["arguments"], json!("{\"q\":\"x\"}"));
        let last = chunks.last().unwrap();
        assert_eq!(last["choices"][0]["finish_reason"], json!("tool_calls"));
        assert_eq!(last["choices"][0]["native_finish_reason"], json!("max_tokens"));
        assert_eq!(last["usage"]["total_tokens"], json!(6));
    }

    #[test]
    fn usage_splits_cached_tokens() {
        let chunks = chunks_of(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"x"}]},"finishReason":"STOP","index":0}],"usageMetadata":{"promptTokenCount":100,"cachedContentTokenCount":30,"candidatesTokenCount":5,"totalTokenCount":105,"thoughtsTokenCount":2}}"#,
        ]);
        let usage = &chunks.last().unwrap()["usage"];
        assert_eq!(usage["prompt_tokens"], json!(100));
        assert_eq!(usage["prompt_tokens_details"]["cached_tokens"], json!(30));
        assert_eq!(usage["completion_tokens_details"]["reasoning_tokens"], json!(2));
    }
}

use std::collections::BTreeMap;

use serde_json::{Value, json};

use xproxy_common::Schema;

use crate::pairs::util::parse_args;

/// Reduce an upstream SSE transcript (already split into data payloads) into
/// the upstream's complete response document, so the per-pair aggregate
/// converter can run on it. One collector per wire schema.
pub(crate) fn collect(schema: Schema, payloads: &[String]) -> Value {
    match schema {
        Schema::Claude => collect_claude(payloads),
        Schema::OpenAIChat => collect_openai(payloads),
        Schema::Gemini => collect_gemini(payloads),
        Schema::OpenAIResponses => collect_codex(payloads),
    }
}

fn collect_claude(payloads: &[String]) -> Value {
    let mut message = json!({
        "id": "msg",
        "type": "message",
        "role": "assistant",
        "model": "unknown",
        "content": [],
        "stop_reason": null,
        "stop_sequence": null,
    });
    let mut blocks: BTreeMap<i64, Value> = BTreeMap::new();
    let mut usage = json!({});

    for payload in payloads {
        let Ok(event) = serde_json::from_str::<Value>(payload) else {
            continue;
        };
        match event.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                if let Some(start) = event.get("message") {
                    for key in ["id", "model", "role"] {
                        if let Some(value) = start.get(key) {
                            message[key] = value.clone();
                        }
                    }
                    if let Some(start_usage) = start.get("usage") {
                        merge_object(&mut usage, start_usage);
                    }
                }
            }
            Some("content_block_start") => {
                let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
                if let Some(block) = event.get("content_block") {
                    blocks.insert(index, block.clone());
                }
            }
            Some("content_block_delta") => {
                let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
                let block = blocks
                    .entry(index)
                    .or_insert_with(|| json!({"type": "text", "text": ""}));
                match event.pointer("/delta/type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        append_str(block, "text", event.pointer("/delta/text"));
                    }
                    Some("thinking_delta") => {
                        append_str(block, "thinking", event.pointer("/delta/thinking"));
                    }
                    Some("signature_delta") => {
                        append_str(block, "signature", event.pointer("/delta/signature"));
                    }
                    Some("input_json_delta") => {
                        append_str(block, "partial_json", event.pointer("/delta/partial_json"));
                    }
                    _ => {}
                }
            }
            Some("content_block_stop") => {
                let index = event.get("index").and_then(Value::as_i64).unwrap_or(0);
                if let Some(block) = blocks.get_mut(&index)
                    && block.get("type").and_then(Value::as_str) == Some("tool_use")
                {
                    let raw = block
                        .get("partial_json")
                        .and_then(Value::as_str)
                        .unwrap_or("{}")
                        .to_string();
                    block["input"] = parse_args(&raw);
                    if let Some(map) = block.as_object_mut() {
                        map.shift_remove("partial_json");
                    }
                }
            }
            Some("message_delta") => {
                if let Some(reason) = event.pointer("/delta/stop_reason") {
                    message["stop_reason"] = reason.clone();
                }
                if let Some(delta_usage) = event.get("usage") {
                    merge_object(&mut usage, delta_usage);
                }
            }
            _ => {}
        }
    }

    let content: Vec<Value> = blocks
        .into_values()
        .map(|mut block| {
            // leftovers from tool blocks that never saw a stop event
            if block.get("type").and_then(Value::as_str) == Some("tool_use")
                && block.get("input").is_none()
            {
                let raw = block
                    .get("partial_json")
                    .and_then(Value::as_str)
                    .unwrap_or("{}")
                    .to_string();
                block["input"] = parse_args(&raw);
            }
            if let Some(map) = block.as_object_mut() {
                map.shift_remove("partial_json");
            }
            block
        })
        .collect();
    message["content"] = Value::Array(content);
    if !usage.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        message["usage"] = usage;
    }
    message
}

fn collect_openai(payloads: &[String]) -> Value {
    let mut out = json!({
        "id": "chatcmpl",
        "object": "chat.completion",
        "created": 0,
        "model": "unknown",
    });
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tools: BTreeMap<i64, Value> = BTreeMap::new();
    let mut finish: Option<Value> = None;
    let mut usage: Option<Value> = None;
    let mut role_seen = false;

    for payload in payloads {
        if payload == "[DONE]" {
            continue;
        }
        let Ok(chunk) = serde_json::from_str::<Value>(payload) else {
            continue;
        };
        if !role_seen {
            for key in ["id", "created", "model"] {
                if let Some(value) = chunk.get(key) {
                    out[key] = value.clone();
                }
            }
            role_seen = true;
        }
        if let Some(chunk_usage) = chunk.get("usage").filter(|value| !value.is_null()) {
            usage = Some(chunk_usage.clone());
        }
        let Some(choice) = chunk.pointer("/choices/0") else {
            continue;
        };
        if let Some(content) = choice.pointer("/delta/content").and_then(Value::as_str) {
            text.push_str(content);
        }
        if let Some(part) = choice
            .pointer("/delta/reasoning_content")
            .and_then(Value::as_str)
        {
            reasoning.push_str(part);
        }
        if let Some(calls) = choice.pointer("/delta/tool_calls").and_then(Value::as_array) {
            for call in calls {
                let index = call.get("index").and_then(Value::as_i64).unwrap_or(0);
                let entry = tools.entry(index).or_insert_with(|| {
                    json!({"id": "", "type": "function", "function": {"name": "", "arguments": ""}})
                });
                if let Some(id) = call.get("id").and_then(Value::as_str) {
                    entry["id"] = json!(id);
                }
                if let Some(name) = call.pointer("/function/name").and_then(Value::as_str) {
                    entry["function"]["name"] = json!(name);
                }
                if let Some(args) = call.pointer("/function/arguments").and_then(Value::as_str) {
                    let current = entry["function"]["arguments"].as_str().unwrap_or("");
                    entry["function"]["arguments"] = json!(format!("{current}{args}"));
                }
            }
        }
        if let Some(reason) = choice.get("finish_reason").filter(|value| !value.is_null()) {
            finish = Some(reason.clone());
        }
    }

    let mut message = json!({
        "role": "assistant",
        "content": if text.is_empty() { Value::Null } else { json!(text) },
    });
    if !reasoning.is_empty() {
        message["reasoning_content"] = json!(reasoning);
    }
    if !tools.is_empty() {
        message["tool_calls"] = Value::Array(tools.into_values().collect());
    }

    out["choices"] = json!([{
        "index": 0,
        "message": message,
        "finish_reason": finish.unwrap_or(json!("stop")),
    }]);
    if let Some(usage) = usage {
        out["usage"] = usage;
    }
    out
}

fn collect_gemini(payloads: &[String]) -> Value {
    let mut out = json!({"candidates": []});
    let mut parts: Vec<Value> = Vec::new();
    let mut finish: Option<Value> = None;
    let mut usage: Option<Value> = None;

    for payload in payloads {
        let Ok(chunk) = serde_json::from_str::<Value>(payload) else {
            continue;
        };
        for key in ["responseId", "modelVersion"] {
            if out.get(key).is_none()
                && let Some(value) = chunk.get(key)
            {
                out[key] = value.clone();
            }
        }
        if let Some(chunk_usage) = chunk.get("usageMetadata") {
            usage = Some(chunk_usage.clone());
        }
        if let Some(candidate) = chunk.pointer("/candidates/0") {
            if let Some(chunk_parts) = candidate.pointer("/content/parts").and_then(Value::as_array)
            {
                for part in chunk_parts {
                    push_gemini_part(&mut parts, part);
                }
            }
            if let Some(reason) = candidate.get("finishReason") {
                finish = Some(reason.clone());
            }
        }
    }

    out["candidates"] = json!([{
        "content": {"role": "model", "parts": parts},
        "finishReason": finish.unwrap_or(json!("STOP")),
        "index": 0,
    }]);
    if let Some(usage) = usage {
        out["usageMetadata"] = usage;
    }
    out
}

/// Consecutive text parts of the same kind merge; anything else appends.
fn push_gemini_part(parts: &mut Vec<Value>, part: &Value) {
    if let Some(text) = part.get("text").and_then(Value::as_str) {
        let thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
        if let Some(last) = parts.last_mut()
            && last.get("text").is_some()
            && last.get("thought").and_then(Value::as_bool).unwrap_or(false) == thought
            && last.get("functionCall").is_none()
        {
            let merged = format!("{}{}", last["text"].as_str().unwrap_or(""), text);
            last["text"] = json!(merged);
            return;
        }
        parts.push(if thought {
            json!({"text": text, "thought": true})
        } else {
            json!({"text": text})
        });
        return;
    }
    parts.push(part.clone());
}

fn collect_codex(payloads: &[String]) -> Value {
    let mut items: BTreeMap<i64, Value> = BTreeMap::new();
    let mut last_response: Option<Value> = None;

    for payload in payloads {
        let Ok(event) = serde_json::from_str::<Value>(payload) else {
            continue;
        };
        match event.get("type").and_then(Value::as_str) {
            Some("response.completed") | Some("response.incomplete")
            | Some("response.failed") => {
                if let Some(response) = event.get("response") {
                    last_response = Some(response.clone());
                }
            }
            Some("response.created") => {
                if last_response.is_none() {
                    last_response = event.get("response").cloned();
                }
            }
            Some("response.output_item.done") => {
                let index = event
                    .get("output_index")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                if let Some(item) = event.get("item") {
                    items.insert(index, item.clone());
                }
            }
            _ => {}
        }
    }

    let mut response = last_response.unwrap_or_else(|| {
        json!({"id": "resp", "object": "response", "model": "unknown", "status": "completed"})
    });
    // A terminal event normally carries the full output; fall back to the
    // item-done record when it does not.
    let missing_output = response
        .get("output")
        .and_then(Value::as_array)
        .map(|output| output.is_empty())
        .unwrap_or(true);
    if missing_output && !items.is_empty() {
        response["output"] = Value::Array(items.into_values().collect());
    }
    response
}

fn append_str(block: &mut Value, key: &str, delta: Option<&Value>) {
    let Some(delta) = delta.and_then(Value::as_str) else {
        return;
    };
    let current = block.get(key).and_then(Value::as_str).unwrap_or("");
    block[key] = json!(format!("{current}{delta}"));
}

fn merge_object(target: &mut Value, source: &Value) {
    let Some(source) = source.as_object() else {
        return;
    };
    for (key, value) in source {
        if !value.is_null() {
            target[key] = value.clone();
        }
    }
}

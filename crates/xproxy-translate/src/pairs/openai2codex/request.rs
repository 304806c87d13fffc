use serde_json::{Value, json};

use crate::tool_names::ToolNameMap;

/// Rewrite an OpenAI chat-completions request as a Responses-API request.
/// System prompts ride along as `developer` messages, assistant history as
/// `output_text`, and tool traffic as function_call / function_call_output
/// items.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    let mut input: Vec<Value> = Vec::new();

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        for message in messages {
            let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
            match role {
                "system" | "developer" => {
                    if let Some(text) = text_content(message.get("content")) {
                        input.push(message_item("developer", "input_text", &text));
                    }
                }
                "assistant" => {
                    if let Some(text) = text_content(message.get("content"))
                        && !text.is_empty()
                    {
                        input.push(message_item("assistant", "output_text", &text));
                    }
                    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
                        for call in calls {
                            let name = names.shorten(
                                call.pointer("/function/name")
                                    .and_then(Value::as_str)
                                    .unwrap_or("tool"),
                            );
                            input.push(json!({
                                "type": "function_call",
                                "call_id": call.get("id").cloned().unwrap_or(json!("call")),
                                "name": name,
                                "arguments": call
                                    .pointer("/function/arguments")
                                    .cloned()
                                    .unwrap_or(json!("{}")),
                            }));
                        }
                    }
                }
                "tool" | "function" => {
                    input.push(json!({
                        "type": "function_call_output",
                        "call_id": message.get("tool_call_id").cloned().unwrap_or(json!("call")),
                        "output": text_content(message.get("content")).unwrap_or_default(),
                    }));
                }
                _ => input.push(map_user(message)),
            }
        }
    }

    let mut out = json!({
        "model": model,
        "input": input,
        "stream": stream,
        "store": false,
    });

    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_choice(body.get("tool_choice"), &mut names) {
        out["tool_choice"] = choice;
    }
    if let Some(max) = body
        .get("max_completion_tokens")
        .or_else(|| body.get("max_tokens"))
        .and_then(Value::as_i64)
    {
        out["max_output_tokens"] = json!(max);
    }
    for knob in ["temperature", "top_p"] {
        if let Some(value) = body.get(knob) {
            out[knob] = value.clone();
        }
    }
    if let Some(effort) = body.get("reasoning_effort").and_then(Value::as_str) {
        out["reasoning"] = json!({"effort": effort});
    }

    out
}

fn message_item(role: &str, kind: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "role": role,
        "content": [{"type": kind, "text": text}],
    })
}

fn map_user(message: &Value) -> Value {
    let mut content: Vec<Value> = Vec::new();
    match message.get("content") {
        Some(Value::String(text)) => content.push(json!({"type": "input_text", "text": text})),
        Some(Value::Array(parts)) => {
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = part.get("text").and_then(Value::as_str) {
                            content.push(json!({"type": "input_text", "text": text}));
                        }
                    }
                    Some("image_url") => {
                        if let Some(url) = part.pointer("/image_url/url").and_then(Value::as_str) {
                            content.push(json!({"type": "input_image", "image_url": url}));
                        }
                    }
                    Some("file") => {
                        let name = part
                            .pointer("/file/filename")
                            .or_else(|| part.pointer("/file/file_id"))
                            .and_then(Value::as_str)
                            .unwrap_or("attachment");
                        content.push(json!({
                            "type": "input_text",
                            "text": format!("[file: {name}]"),
                        }));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    json!({"type": "message", "role": "user", "content": content})
}

fn text_content(content: Option<&Value>) -> Option<String> {
    match content {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Array(parts)) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

fn map_tools(tools: Option<&Value>, names: &mut ToolNameMap) -> Option<Value> {
    let tools = tools?.as_array()?;
    let mapped: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            let function = tool.get("function")?;
            let name = names.shorten(function.get("name")?.as_str()?);
            let mut entry = json!({
                "type": "function",
                "name": name,
                "parameters": function
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object"})),
            });
            if let Some(description) = function.get("description") {
                entry["description"] = description.clone();
            }
            Some(entry)
        })
        .collect();
    if mapped.is_empty() {
        None
    } else {
        Some(Value::Array(mapped))
    }
}

fn map_tool_choice(choice: Option<&Value>, names: &mut ToolNameMap) -> Option<Value> {
    match choice? {
        Value::String(mode) => match mode.as_str() {
            "auto" | "required" | "none" => Some(json!(mode)),
            _ => None,
        },
        named => {
            let name = names.shorten(named.pointer("/function/name")?.as_str()?);
            Some(json!({"type": "function", "name": name}))
        }
    }
}

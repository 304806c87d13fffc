use serde_json::{Value, json};

use crate::tool_names::ToolNameMap;

/// Rewrite a Responses-API request as an OpenAI chat-completions request.
/// `instructions` and developer messages fold back into a system message;
/// function_call / function_call_output items become assistant tool calls and
/// tool turns.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    let mut messages: Vec<Value> = Vec::new();

    if let Some(instructions) = body.get("instructions").and_then(Value::as_str)
        && !instructions.is_empty()
    {
        messages.push(json!({"role": "system", "content": instructions}));
    }

    match body.get("input") {
        Some(Value::String(prompt)) => {
            messages.push(json!({"role": "user", "content": prompt}));
        }
        Some(Value::Array(items)) => {
            for item in items {
                map_item(item, &mut messages, &mut names);
            }
        }
        _ => {}
    }

    let mut out = json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });

    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_choice(body.get("tool_choice"), &mut names) {
        out["tool_choice"] = choice;
    }
    if let Some(max) = body.get("max_output_tokens").and_then(Value::as_i64) {
        out["max_completion_tokens"] = json!(max);
    }
    for knob in ["temperature", "top_p"] {
        if let Some(value) = body.get(knob) {
            out[knob] = value.clone();
        }
    }
    if let Some(effort) = body.pointer("/reasoning/effort").and_then(Value::as_str) {
        out["reasoning_effort"] = json!(effort);
    }

    out
}

fn map_item(item: &Value, messages: &mut Vec<Value>, names: &mut ToolNameMap) {
    match item.get("type").and_then(Value::as_str) {
        Some("message") | None => {
            let role = match item.get("role").and_then(Value::as_str).unwrap_or("user") {
                "developer" | "system" => "system",
                "assistant" => "assistant",
                _ => "user",
            };
            if role == "user" {
                messages.push(json!({
                    "role": "user",
                    "content": user_parts(item.get("content")),
                }));
            } else if let Some(text) = text_content(item.get("content")) {
                messages.push(json!({"role": role, "content": text}));
            }
        }
        Some("function_call") => {
            let name = names.shorten(item.get("name").and_then(Value::as_str).unwrap_or("tool"));
            messages.push(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": item.get("call_id").cloned().unwrap_or(json!("call")),
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": item.get("arguments").cloned().unwrap_or(json!("{}")),
                    },
                }],
            }));
        }
        Some("function_call_output") => {
            messages.push(json!({
                "role": "tool",
                "tool_call_id": item.get("call_id").cloned().unwrap_or(json!("call")),
                "content": item.get("output").cloned().unwrap_or(json!("")),
            }));
        }
        // Reasoning items from past turns have no chat-completions shape.
        _ => {}
    }
}

fn user_parts(content: Option<&Value>) -> Value {
    let Some(parts) = content.and_then(Value::as_array) else {
        return match content.and_then(Value::as_str) {
            Some(text) => json!(text),
            None => json!(""),
        };
    };

    let mut mapped: Vec<Value> = Vec::new();
    for part in parts {
        match part.get("type").and_then(Value::as_str) {
            Some("input_text") | Some("output_text") | Some("text") => {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    mapped.push(json!({"type": "text", "text": text}));
                }
            }
            Some("input_image") => {
                if let Some(url) = part
                    .get("image_url")
                    .and_then(Value::as_str)
                    .or_else(|| part.pointer("/image_url/url").and_then(Value::as_str))
                {
                    mapped.push(json!({"type": "image_url", "image_url": {"url": url}}));
                }
            }
            Some("input_file") => {
                let name = part
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or("attachment");
                mapped.push(json!({"type": "text", "text": format!("[file: {name}]")}));
            }
            _ => {}
        }
    }

    if mapped.len() == 1
        && let Some(text) = mapped[0].get("text").and_then(Value::as_str)
    {
        return json!(text);
    }
    Value::Array(mapped)
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
            if tool.get("type").and_then(Value::as_str) != Some("function") {
                return None;
            }
            let name = names.shorten(tool.get("name")?.as_str()?);
            let mut function = json!({
                "name": name,
                "parameters": tool
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object"})),
            });
            if let Some(description) = tool.get("description") {
                function["description"] = description.clone();
            }
            Some(json!({"type": "function", "function": function}))
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
            let name = names.shorten(named.get("name")?.as_str()?);
            Some(json!({"type": "function", "function": {"name": name}}))
        }
    }
}

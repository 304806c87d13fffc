use serde_json::{Value, json};

use xproxy_model::ThinkingLevel;
use xproxy_thinking::level_for_budget;

use crate::pairs::util::args_string;
use crate::tool_names::ToolNameMap;

/// Rewrite a Claude create-message request as a Responses-API request. The
/// system prompt becomes a developer message, tool_use history becomes
/// function_call items, tool_result blocks become function_call_output items.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    let mut input: Vec<Value> = Vec::new();

    if let Some(text) = system_text(body.get("system")) {
        input.push(json!({
            "type": "message",
            "role": "developer",
            "content": [{"type": "input_text", "text": text}],
        }));
    }

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        for message in messages {
            let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
            if role == "assistant" {
                map_assistant(message.get("content"), &mut input, &mut names);
            } else {
                map_user(message.get("content"), &mut input);
            }
        }
    }

    let mut out = json!({
        "model": model,
        "input": input,
        "stream": stream,
        "store": false,
    });

    if let Some(max) = body.get("max_tokens").and_then(Value::as_i64) {
        out["max_output_tokens"] = json!(max);
    }
    for knob in ["temperature", "top_p"] {
        if let Some(value) = body.get(knob) {
            out[knob] = value.clone();
        }
    }
    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_choice(body.get("tool_choice"), &mut names) {
        out["tool_choice"] = choice;
    }
    if let Some(effort) = map_thinking(body.get("thinking")) {
        out["reasoning"] = json!({"effort": effort});
    }

    out
}

fn system_text(system: Option<&Value>) -> Option<String> {
    match system? {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
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

fn map_user(content: Option<&Value>, input: &mut Vec<Value>) {
    let mut parts: Vec<Value> = Vec::new();

    match content {
        Some(Value::String(text)) => parts.push(json!({"type": "input_text", "text": text})),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            parts.push(json!({"type": "input_text", "text": text}));
                        }
                    }
                    Some("image") => {
                        if let Some(source) = block.get("source")
                            && source.get("type").and_then(Value::as_str) == Some("base64")
                            && let (Some(mime), Some(data)) = (
                                source.get("media_type").and_then(Value::as_str),
                                source.get("data").and_then(Value::as_str),
                            )
                        {
                            parts.push(json!({
                                "type": "input_image",
                                "image_url": format!("data:{mime};base64,{data}"),
                            }));
                        }
                    }
                    Some("tool_result") => {
                        if !parts.is_empty() {
                            input.push(user_message(std::mem::take(&mut parts)));
                        }
                        input.push(json!({
                            "type": "function_call_output",
                            "call_id": block.get("tool_use_id").cloned().unwrap_or(json!("call")),
                            "output": tool_result_text(block.get("content")),
                        }));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    if !parts.is_empty() {
        input.push(user_message(parts));
    }
}

fn user_message(parts: Vec<Value>) -> Value {
    json!({"type": "message", "role": "user", "content": parts})
}

fn map_assistant(content: Option<&Value>, input: &mut Vec<Value>, names: &mut ToolNameMap) {
    let mut text = String::new();
    match content {
        Some(Value::String(plain)) => text.push_str(plain),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(part) = block.get("text").and_then(Value::as_str) {
                            text.push_str(part);
                        }
                    }
                    Some("tool_use") => {
                        if !text.is_empty() {
                            input.push(assistant_message(&std::mem::take(&mut text)));
                        }
                        let name = names.shorten(
                            block.get("name").and_then(Value::as_str).unwrap_or("tool"),
                        );
                        input.push(json!({
                            "type": "function_call",
                            "call_id": block.get("id").cloned().unwrap_or(json!("call")),
                            "name": name,
                            "arguments": args_string(block.get("input").unwrap_or(&Value::Null)),
                        }));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    if !text.is_empty() {
        input.push(assistant_message(&text));
    }
}

fn assistant_message(text: &str) -> Value {
    json!({
        "type": "message",
        "role": "assistant",
        "content": [{"type": "output_text", "text": text}],
    })
}

fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn map_tools(tools: Option<&Value>, names: &mut ToolNameMap) -> Option<Value> {
    let tools = tools?.as_array()?;
    let mapped: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            let name = names.shorten(tool.get("name")?.as_str()?);
            let mut entry = json!({
                "type": "function",
                "name": name,
                "parameters": tool
                    .get("input_schema")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object"})),
            });
            if let Some(description) = tool.get("description") {
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
    let choice = choice?;
    match choice.get("type").and_then(Value::as_str)? {
        "auto" => Some(json!("auto")),
        "any" => Some(json!("required")),
        "none" => Some(json!("none")),
        "tool" => {
            let name = names.shorten(choice.get("name")?.as_str()?);
            Some(json!({"type": "function", "name": name}))
        }
        _ => None,
    }
}

fn map_thinking(thinking: Option<&Value>) -> Option<&'static str> {
    let thinking = thinking?;
    match thinking.get("type").and_then(Value::as_str)? {
        "disabled" => Some("none"),
        "adaptive" => Some(ThinkingLevel::XHigh.as_str()),
        "enabled" => match thinking.get("budget_tokens").and_then(Value::as_i64) {
            Some(budget) => Some(level_for_budget(budget).as_str()),
            None => Some("auto"),
        },
        _ => None,
    }
}

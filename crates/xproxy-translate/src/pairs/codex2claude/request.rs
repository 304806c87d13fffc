use serde_json::{Value, json};

use xproxy_json::get_f64;
use xproxy_model::ThinkingLevel;
use xproxy_thinking::budget_for_level;

use crate::pairs::util::{parse_args, parse_data_url};

const DEFAULT_MAX_TOKENS: i64 = 4096;

/// Rewrite a Responses-API request as a Claude create-message request.
/// `instructions` plus developer messages fold into the system prompt;
/// function_call / function_call_output items become tool_use and tool_result
/// blocks.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut system_parts: Vec<String> = Vec::new();
    if let Some(instructions) = body.get("instructions").and_then(Value::as_str)
        && !instructions.is_empty()
    {
        system_parts.push(instructions.to_string());
    }

    let mut messages: Vec<Value> = Vec::new();
    match body.get("input") {
        Some(Value::String(prompt)) => {
            messages.push(json!({"role": "user", "content": prompt}));
        }
        Some(Value::Array(items)) => {
            for item in items {
                map_item(item, &mut messages, &mut system_parts);
            }
        }
        _ => {}
    }

    let mut out = json!({
        "model": model,
        "messages": messages,
        "max_tokens": body
            .get("max_output_tokens")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        "stream": stream,
    });

    if !system_parts.is_empty() {
        out["system"] = json!(system_parts.join("\n"));
    }
    // Responses allows temperatures up to 2.0; Claude caps at 1.0.
    if let Some(temperature) = get_f64(&body, "temperature") {
        out["temperature"] = json!(temperature.min(1.0));
    }
    if let Some(top_p) = body.get("top_p") {
        out["top_p"] = top_p.clone();
    }
    if let Some(tools) = map_tools(body.get("tools")) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_choice(body.get("tool_choice")) {
        out["tool_choice"] = choice;
    }
    if let Some(thinking) = map_thinking(body.pointer("/reasoning/effort")) {
        out["thinking"] = thinking;
    }

    out
}

fn map_item(item: &Value, messages: &mut Vec<Value>, system_parts: &mut Vec<String>) {
    match item.get("type").and_then(Value::as_str) {
        Some("message") | None => {
            let role = item.get("role").and_then(Value::as_str).unwrap_or("user");
            match role {
                "developer" | "system" => {
                    if let Some(text) = text_content(item.get("content")) {
                        system_parts.push(text);
                    }
                }
                "assistant" => {
                    if let Some(text) = text_content(item.get("content"))
                        && !text.is_empty()
                    {
                        messages.push(json!({
                            "role": "assistant",
                            "content": [{"type": "text", "text": text}],
                        }));
                    }
                }
                _ => {
                    messages.push(json!({
                        "role": "user",
                        "content": user_blocks(item.get("content")),
                    }));
                }
            }
        }
        Some("function_call") => {
            messages.push(json!({
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "id": item.get("call_id").cloned().unwrap_or(json!("call")),
                    "name": item.get("name").cloned().unwrap_or(json!("tool")),
                    "input": parse_args(
                        item.get("arguments").and_then(Value::as_str).unwrap_or("{}"),
                    ),
                }],
            }));
        }
        Some("function_call_output") => {
            messages.push(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": item.get("call_id").cloned().unwrap_or(json!("call")),
                    "content": item
                        .get("output")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                }],
            }));
        }
        _ => {}
    }
}

fn user_blocks(content: Option<&Value>) -> Value {
    let Some(parts) = content.and_then(Value::as_array) else {
        return match content.and_then(Value::as_str) {
            Some(text) => json!(text),
            None => json!([]),
        };
    };

    let mut blocks: Vec<Value> = Vec::new();
    for part in parts {
        match part.get("type").and_then(Value::as_str) {
            Some("input_text") | Some("output_text") | Some("text") => {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    blocks.push(json!({"type": "text", "text": text}));
                }
            }
            Some("input_image") => {
                if let Some(url) = part
                    .get("image_url")
                    .and_then(Value::as_str)
                    .or_else(|| part.pointer("/image_url/url").and_then(Value::as_str))
                {
                    blocks.push(match parse_data_url(url) {
                        Some((mime, data)) => json!({
                            "type": "image",
                            "source": {"type": "base64", "media_type": mime, "data": data},
                        }),
                        None => json!({
                            "type": "image",
                            "source": {"type": "url", "url": url},
                        }),
                    });
                }
            }
            Some("input_file") => {
                let name = part
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or("attachment");
                blocks.push(json!({"type": "text", "text": format!("[file: {name}]")}));
            }
            _ => {}
        }
    }
    Value::Array(blocks)
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

fn map_tools(tools: Option<&Value>) -> Option<Value> {
    let tools = tools?.as_array()?;
    let mapped: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            if tool.get("type").and_then(Value::as_str) != Some("function") {
                return None;
            }
            let name = tool.get("name")?.as_str()?;
            let mut entry = json!({
                "name": name,
                "input_schema": tool
                    .get("parameters")
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

fn map_tool_choice(choice: Option<&Value>) -> Option<Value> {
    match choice? {
        Value::String(mode) => match mode.as_str() {
            "auto" => Some(json!({"type": "auto"})),
            "required" => Some(json!({"type": "any"})),
            "none" => Some(json!({"type": "none"})),
            _ => None,
        },
        named => {
            let name = named.get("name")?.as_str()?;
            Some(json!({"type": "tool", "name": name}))
        }
    }
}

fn map_thinking(effort: Option<&Value>) -> Option<Value> {
    let effort = effort?.as_str()?;
    match effort.to_ascii_lowercase().as_str() {
        "none" => Some(json!({"type": "disabled"})),
        "auto" => Some(json!({"type": "enabled"})),
        other => {
            let level = ThinkingLevel::parse(other)?;
            Some(json!({
                "type": "enabled",
                "budget_tokens": budget_for_level(level, 0),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_merge_with_developer_messages() {
        let body = json!({
            "instructions": "base",
            "input": [
                {"type": "message", "role": "developer", "content": [
                    {"type": "input_text", "text": "more"}
                ]},
                {"type": "message", "role": "user", "content": [
                    {"type": "input_text", "text": "go"}
                ]}
            ],
            "reasoning": {"effort": "low"}
        });
        let out = transform_request("claude-sonnet-4-5", body, false);
        assert_eq!(out["system"], json!("base\nmore"));
        assert_eq!(out["messages"][0]["content"][0]["text"], json!("go"));
        assert_eq!(out["thinking"], json!({"type": "enabled", "budget_tokens": 1024}));
        assert_eq!(out["max_tokens"], json!(4096));
    }

    #[test]
    fn call_items_become_blocks() {
        let body = json!({
            "input": [
                {"type": "function_call", "call_id": "c9", "name": "fetch", "arguments": "{\"u\":\"v\"}"},
                {"type": "function_call_output", "call_id": "c9", "output": "body"}
            ]
        });
        let out = transform_request("claude-sonnet-4-5", body, false);
        let tool_use = &out["messages"][0]["content"][0];
        assert_eq!(tool_use["type"], json!("tool_use"));
        assert_eq!(tool_use["input"], json!({"u": "v"}));
        let result = &out["messages"][1]["content"][0];
        assert_eq!(result["type"], json!("tool_result"));
        assert_eq!(result["tool_use_id"], json!("c9"));
    }
}

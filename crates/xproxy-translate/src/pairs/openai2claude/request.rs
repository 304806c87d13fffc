use serde_json::{Value, json};

use xproxy_json::{get_f64, walk_key};
use xproxy_model::ThinkingLevel;
use xproxy_thinking::budget_for_level;

use crate::pairs::util::{parse_args, parse_data_url};

const DEFAULT_MAX_TOKENS: i64 = 4096;

/// Rewrite an OpenAI chat-completions request as a Claude create-message
/// request.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut out = json!({
        "model": model,
        "max_tokens": body
            .get("max_completion_tokens")
            .or_else(|| body.get("max_tokens"))
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        "stream": stream,
    });

    let (system, messages) = map_messages(body.get("messages"));
    if !system.is_empty() {
        out["system"] = json!(system);
    }
    out["messages"] = Value::Array(messages);

    if let Some(tools) = map_tools(body.get("tools")) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_choice(body.get("tool_choice")) {
        out["tool_choice"] = choice;
    }

    // Chat Completions allows temperatures up to 2.0; Claude caps at 1.0.
    if let Some(temperature) = get_f64(&body, "temperature") {
        out["temperature"] = json!(temperature.min(1.0));
    }
    if let Some(top_p) = body.get("top_p") {
        out["top_p"] = top_p.clone();
    }
    if let Some(stop) = map_stop(body.get("stop")) {
        out["stop_sequences"] = stop;
    }
    if let Some(user) = body.pointer("/metadata/user_id").or_else(|| body.get("user")) {
        out["metadata"] = json!({"user_id": user});
    }

    if let Some(thinking) = map_thinking(body.get("reasoning_effort")) {
        out["thinking"] = thinking;
    }

    out
}

fn map_messages(messages: Option<&Value>) -> (String, Vec<Value>) {
    let mut system_parts: Vec<String> = Vec::new();
    let mut out: Vec<Value> = Vec::new();

    let Some(messages) = messages.and_then(Value::as_array) else {
        return (String::new(), out);
    };

    for message in messages {
        let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
        match role {
            "system" | "developer" => {
                if let Some(text) = text_content(message.get("content")) {
                    system_parts.push(text);
                }
            }
            "assistant" => out.push(map_assistant(message)),
            "tool" | "function" => {
                // Tool results live in user turns on the Claude side.
                let id = message
                    .get("tool_call_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let text = text_content(message.get("content")).unwrap_or_default();
                out.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": id,
                        "content": text,
                    }],
                }));
            }
            _ => out.push(map_user(message)),
        }
    }

    (system_parts.join("\n"), out)
}

fn map_user(message: &Value) -> Value {
    let mut blocks: Vec<Value> = Vec::new();
    match message.get("content") {
        Some(Value::String(text)) => {
            return json!({"role": "user", "content": text});
        }
        Some(Value::Array(parts)) => {
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = part.get("text").and_then(Value::as_str) {
                            blocks.push(json!({"type": "text", "text": text}));
                        }
                    }
                    Some("image_url") => {
                        if let Some(block) =
                            map_image(part.pointer("/image_url/url").and_then(Value::as_str))
                        {
                            blocks.push(block);
                        }
                    }
                    Some("file") => {
                        let name = part
                            .pointer("/file/filename")
                            .or_else(|| part.pointer("/file/file_id"))
                            .and_then(Value::as_str)
                            .unwrap_or("attachment");
                        blocks.push(json!({"type": "text", "text": format!("[file: {name}]")}));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    json!({"role": "user", "content": blocks})
}

fn map_assistant(message: &Value) -> Value {
    let mut blocks: Vec<Value> = Vec::new();
    if let Some(text) = text_content(message.get("content"))
        && !text.is_empty()
    {
        blocks.push(json!({"type": "text", "text": text}));
    }

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
            let name = call
                .pointer("/function/name")
                .and_then(Value::as_str)
                .unwrap_or("tool");
            let arguments = call
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            blocks.push(json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": parse_args(arguments),
            }));
        }
    }

    json!({"role": "assistant", "content": blocks})
}

fn map_image(url: Option<&str>) -> Option<Value> {
    let url = url?;
    match parse_data_url(url) {
        Some((mime, data)) => Some(json!({
            "type": "image",
            "source": {"type": "base64", "media_type": mime, "data": data},
        })),
        None => Some(json!({
            "type": "image",
            "source": {"type": "url", "url": url},
        })),
    }
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
            let function = tool.get("function")?;
            let name = function.get("name")?.as_str()?;
            let mut schema = function
                .get("parameters")
                .cloned()
                .unwrap_or_else(|| json!({"type": "object"}));
            // Claude rejects upper-cased JSON-schema type names some clients
            // emit.
            walk_key(&mut schema, "type", &mut |value| {
                if let Some(text) = value.as_str() {
                    *value = json!(text.to_ascii_lowercase());
                }
            });
            let mut entry = json!({"name": name, "input_schema": schema});
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

fn map_tool_choice(choice: Option<&Value>) -> Option<Value> {
    match choice? {
        Value::String(mode) => match mode.as_str() {
            "auto" => Some(json!({"type": "auto"})),
            "required" => Some(json!({"type": "any"})),
            "none" => Some(json!({"type": "none"})),
            _ => None,
        },
        named => {
            let name = named.pointer("/function/name")?.as_str()?;
            Some(json!({"type": "tool", "name": name}))
        }
    }
}

fn map_stop(stop: Option<&Value>) -> Option<Value> {
    match stop? {
        Value::String(single) => Some(json!([single])),
        Value::Array(many) if !many.is_empty() => Some(Value::Array(many.clone())),
        _ => None,
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
    fn basic_request_shape() {
        let body = json!({
            "model": "ignored",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ],
            "max_completion_tokens": 2000,
            "temperature": 0.5,
            "stop": "END"
        });
        let out = transform_request("claude-sonnet-4-5", body, true);
        assert_eq!(out["model"], json!("claude-sonnet-4-5"));
        assert_eq!(out["max_tokens"], json!(2000));
        assert_eq!(out["system"], json!("be brief"));
        assert_eq!(out["stream"], json!(true));
        assert_eq!(out["stop_sequences"], json!(["END"]));
        assert_eq!(out["messages"][0]["content"], json!("hello"));
    }

    #[test]
    fn tool_round_trip_shapes() {
        let body = json!({
            "messages": [
                {"role": "assistant", "tool_calls": [{
                    "id": "call_1", "type": "function",
                    "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}
                }]},
                {"role": "tool", "tool_call_id": "call_1", "content": "42"}
            ],
            "tools": [{"type": "function", "function": {
                "name": "lookup",
                "description": "Find things",
                "parameters": {"type": "OBJECT", "properties": {"q": {"type": "STRING"}}}
            }}],
            "tool_choice": "required"
        });
        let out = transform_request("claude-sonnet-4-5", body, false);
        let tool_use = &out["messages"][0]["content"][0];
        assert_eq!(tool_use["type"], json!("tool_use"));
        assert_eq!(tool_use["input"], json!({"q": "x"}));
        let result = &out["messages"][1]["content"][0];
        assert_eq!(result["tool_use_id"], json!("call_1"));
        assert_eq!(out["tools"][0]["input_schema"]["type"], json!("object"));
        assert_eq!(
            out["tools"][0]["input_schema"]["properties"]["q"]["type"],
            json!("string")
        );
        assert_eq!(out["tool_choice"], json!({"type": "any"}));
    }

    #[test]
    fn image_data_url_becomes_base64_source() {
        let body = json!({
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ]}]
        });
        let out = transform_request("m", body, false);
        let image = &out["messages"][0]["content"][1];
        assert_eq!(image["source"]["media_type"], json!("image/png"));
        assert_eq!(image["source"]["data"], json!("AAAA"));
    }

    #[test]
    fn temperature_clamps_to_claude_range() {
        let body = json!({"messages": [], "temperature": 1.7, "top_p": 0.95});
        let out = transform_request("m", body, false);
        assert_eq!(out["temperature"], json!(1.0));
        assert_eq!(out["top_p"], json!(0.95));

        let in_range = json!({"messages": [], "temperature": 0.4});
        let out = transform_request("m", in_range, false);
        assert_eq!(out["temperature"], json!(0.4));
    }

    #[test]
    fn reasoning_effort_translates_structurally() {
        let body = json!({"messages": [], "reasoning_effort": "medium"});
        let out = transform_request("m", body, false);
        assert_eq!(out["thinking"], json!({"type": "enabled", "budget_tokens": 8192}));

        let off = json!({"messages": [], "reasoning_effort": "none"});
        let out = transform_request("m", off, false);
        assert_eq!(out["thinking"], json!({"type": "disabled"}));
    }
}

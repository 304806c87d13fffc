use serde_json::{Value, json};

use xproxy_thinking::level_for_budget;

use crate::pairs::util::args_string;
use crate::tool_names::ToolNameMap;

/// Rewrite a Claude create-message request as an OpenAI chat-completions
/// request.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut names = ToolNameMap::new();

    let mut messages: Vec<Value> = Vec::new();
    if let Some(system) = map_system(body.get("system")) {
        messages.push(system);
    }
    if let Some(history) = body.get("messages").and_then(Value::as_array) {
        for message in history {
            messages.extend(map_message(message, &mut names));
        }
    }

    let mut out = json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });

    if let Some(max_tokens) = body.get("max_tokens").and_then(Value::as_i64) {
        out["max_completion_tokens"] = json!(max_tokens);
    }
    for knob in ["temperature", "top_p"] {
        if let Some(value) = body.get(knob) {
            out[knob] = value.clone();
        }
    }
    if let Some(sequences) = body.get("stop_sequences").and_then(Value::as_array)
        && !sequences.is_empty()
    {
        out["stop"] = json!(sequences);
    }
    if let Some(user) = body.pointer("/metadata/user_id") {
        out["user"] = user.clone();
    }

    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_choice(body.get("tool_choice"), &mut names) {
        out["tool_choice"] = choice;
    }
    if let Some(effort) = map_thinking(body.get("thinking")) {
        out["reasoning_effort"] = json!(effort);
    }

    out
}

fn map_system(system: Option<&Value>) -> Option<Value> {
    let text = match system? {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                return None;
            }
            texts.join("\n")
        }
        _ => return None,
    };
    Some(json!({"role": "system", "content": text}))
}

fn map_message(message: &Value, names: &mut ToolNameMap) -> Vec<Value> {
    let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
    let content = message.get("content");

    if role == "assistant" {
        return vec![map_assistant(content, names)];
    }
    map_user(content)
}

fn map_user(content: Option<&Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    let mut parts: Vec<Value> = Vec::new();

    match content {
        Some(Value::String(text)) => {
            return vec![json!({"role": "user", "content": text})];
        }
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            parts.push(json!({"type": "text", "text": text}));
                        }
                    }
                    Some("image") => {
                        if let Some(part) = map_image(block.get("source")) {
                            parts.push(part);
                        }
                    }
                    Some("tool_result") => {
                        flush_user(&mut out, &mut parts);
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": block
                                .get("tool_use_id")
                                .cloned()
                                .unwrap_or(json!("")),
                            "content": tool_result_text(block.get("content")),
                        }));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    flush_user(&mut out, &mut parts);
    out
}

fn flush_user(out: &mut Vec<Value>, parts: &mut Vec<Value>) {
    if parts.is_empty() {
        return;
    }
    out.push(json!({"role": "user", "content": std::mem::take(parts)}));
}

fn map_assistant(content: Option<&Value>, names: &mut ToolNameMap) -> Value {
    let mut text = String::new();
    let mut tool_calls: Vec<Value> = Vec::new();

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
                        let name = names.shorten(
                            block.get("name").and_then(Value::as_str).unwrap_or("tool"),
                        );
                        tool_calls.push(json!({
                            "id": block.get("id").cloned().unwrap_or(json!("tool")),
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": args_string(
                                    block.get("input").unwrap_or(&Value::Null)
                                ),
                            },
                        }));
                    }
                    // Historical thinking blocks have no chat-completions
                    // request shape; they are dropped, not forwarded as text.
                    _ => {}
                }
            }
        }
        _ => {}
    }

    let mut message = json!({"role": "assistant"});
    message["content"] = if text.is_empty() {
        Value::Null
    } else {
        json!(text)
    };
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }
    message
}

fn map_image(source: Option<&Value>) -> Option<Value> {
    let source = source?;
    let url = match source.get("type").and_then(Value::as_str)? {
        "base64" => format!(
            "data:{};base64,{}",
            source.get("media_type").and_then(Value::as_str)?,
            source.get("data").and_then(Value::as_str)?,
        ),
        "url" => source.get("url").and_then(Value::as_str)?.to_string(),
        _ => return None,
    };
    Some(json!({"type": "image_url", "image_url": {"url": url}}))
}

fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| match block.get("type").and_then(Value::as_str) {
                Some("text") => block
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Some("image") => Some("[tool_result image]".to_string()),
                _ => None,
            })
            .collect::<Vec<String>>()
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
            let mut function = json!({
                "name": name,
                "parameters": tool
                    .get("input_schema")
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
    let choice = choice?;
    match choice.get("type").and_then(Value::as_str)? {
        "auto" => Some(json!("auto")),
        "any" => Some(json!("required")),
        "none" => Some(json!("none")),
        "tool" => {
            let name = names.shorten(choice.get("name")?.as_str()?);
            Some(json!({"type": "function", "function": {"name": name}}))
        }
        _ => None,
    }
}

fn map_thinking(thinking: Option<&Value>) -> Option<&'static str> {
    let thinking = thinking?;
    match thinking.get("type").and_then(Value::as_str)? {
        "disabled" => Some("none"),
        "adaptive" => Some("xhigh"),
        "enabled" => match thinking.get("budget_tokens").and_then(Value::as_i64) {
            Some(budget) => Some(level_for_budget(budget).as_str()),
            None => Some("auto"),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_and_history_map() {
        let body = json!({
            "system": "terse",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": [{"type": "text", "text": "hello"}]}
            ],
            "max_tokens": 1000,
            "stop_sequences": ["STOP"]
        });
        let out = transform_request("gpt-5", body, false);
        assert_eq!(out["messages"][0], json!({"role": "system", "content": "terse"}));
        assert_eq!(out["messages"][1]["content"], json!("hi"));
        assert_eq!(out["messages"][2]["content"], json!("hello"));
        assert_eq!(out["max_completion_tokens"], json!(1000));
        assert_eq!(out["stop"], json!(["STOP"]));
    }

    #[test]
    fn tool_use_and_result_split_into_turns() {
        let body = json!({
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "x"}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": [
                        {"type": "text", "text": "42"}
                    ]},
                    {"type": "text", "text": "now answer"}
                ]}
            ]
        });
        let out = transform_request("gpt-5", body, false);
        let calls = &out["messages"][0]["tool_calls"];
        assert_eq!(calls[0]["function"]["arguments"], json!("{\"q\":\"x\"}"));
        assert_eq!(out["messages"][1]["role"], json!("tool"));
        assert_eq!(out["messages"][1]["content"], json!("42"));
        assert_eq!(out["messages"][2]["role"], json!("user"));
    }

    #[test]
    fn long_tool_names_are_shortened_consistently() {
        let long = format!("mcp__srv__{}", "n".repeat(80));
        let body = json!({
            "messages": [{"role": "assistant", "content": [
                {"type": "tool_use", "id": "t", "name": long, "input": {}}
            ]}],
            "tools": [{"name": long, "input_schema": {"type": "object"}}]
        });
        let out = transform_request("gpt-5", body, false);
        let in_tools = out["tools"][0]["function"]["name"].as_str().unwrap();
        let in_call = out["messages"][0]["tool_calls"][0]["function"]["name"]
            .as_str()
            .unwrap();
        assert_eq!(in_tools, in_call);
        assert!(in_tools.len() <= 64);
        assert!(in_tools.starts_with("mcp__"));
    }

    #[test]
    fn thinking_budget_becomes_effort() {
        let body = json!({"messages": [], "thinking": {"type": "enabled", "budget_tokens": 500}});
        let out = transform_request("gpt-5", body, false);
        assert_eq!(out["reasoning_effort"], json!("low"));

        let adaptive = json!({"messages": [], "thinking": {"type": "adaptive"}});
        let out = transform_request("gpt-5", adaptive, false);
        assert_eq!(out["reasoning_effort"], json!("xhigh"));
    }
}

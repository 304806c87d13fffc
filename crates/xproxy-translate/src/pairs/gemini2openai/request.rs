use serde_json::{Value, json};

use xproxy_thinking::level_for_budget;

use crate::pairs::util::args_string;
use crate::tool_ids::ToolIdQueue;
use crate::tool_names::ToolNameMap;

/// Rewrite a Gemini generate-content request as an OpenAI chat-completions
/// request. Gemini pairs function calls with responses by order; fresh
/// `toolu_` ids are minted per call and dequeued when the matching response
/// turns up.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    let mut ids = ToolIdQueue::new();

    let mut messages: Vec<Value> = Vec::new();
    if let Some(text) = system_text(&body) {
        messages.push(json!({"role": "system", "content": text}));
    }

    if let Some(contents) = body.get("contents").and_then(Value::as_array) {
        for content in contents {
            let role = content.get("role").and_then(Value::as_str).unwrap_or("user");
            if role == "model" {
                messages.push(map_model_turn(content, &mut names, &mut ids));
            } else {
                messages.extend(map_user_turn(content, &mut ids));
            }
        }
    }

    let mut out = json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });

    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_config(body.get("toolConfig"), &mut names) {
        out["tool_choice"] = choice;
    }

    let config = body.get("generationConfig").cloned().unwrap_or(json!({}));
    if let Some(max) = config.get("maxOutputTokens").and_then(Value::as_i64) {
        out["max_completion_tokens"] = json!(max);
    }
    if let Some(temperature) = config.get("temperature") {
        out["temperature"] = temperature.clone();
    }
    if let Some(top_p) = config.get("topP") {
        out["top_p"] = top_p.clone();
    }
    if let Some(stops) = config.get("stopSequences").and_then(Value::as_array)
        && !stops.is_empty()
    {
        out["stop"] = json!(stops);
    }
    if let Some(effort) = map_thinking(config.get("thinkingConfig")) {
        out["reasoning_effort"] = json!(effort);
    }

    out
}

fn system_text(body: &Value) -> Option<String> {
    let instruction = body
        .get("systemInstruction")
        .or_else(|| body.get("system_instruction"))?;
    let parts = instruction.get("parts").and_then(Value::as_array)?;
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

fn map_user_turn(content: &Value, ids: &mut ToolIdQueue) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    let mut parts_out: Vec<Value> = Vec::new();

    if let Some(parts) = content.get("parts").and_then(Value::as_array) {
        for part in parts {
            if let Some(response) = part.get("functionResponse") {
                if !parts_out.is_empty() {
                    out.push(user_message(std::mem::take(&mut parts_out)));
                }
                let output = response
                    .get("response")
                    .map(Value::to_string)
                    .unwrap_or_else(|| "{}".to_string());
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": ids.pop_response(),
                    "content": output,
                }));
                continue;
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                parts_out.push(json!({"type": "text", "text": text}));
            }
            if let Some(data) = part.get("inlineData")
                && let (Some(mime), Some(payload)) = (
                    data.get("mimeType").and_then(Value::as_str),
                    data.get("data").and_then(Value::as_str),
                )
            {
                parts_out.push(json!({
                    "type": "image_url",
                    "image_url": {"url": format!("data:{mime};base64,{payload}")},
                }));
            }
            if let Some(file) = part.get("fileData")
                && let Some(uri) = file.get("fileUri").and_then(Value::as_str)
            {
                parts_out.push(json!({"type": "text", "text": format!("[file: {uri}]")}));
            }
        }
    }

    if !parts_out.is_empty() {
        out.push(user_message(parts_out));
    }
    out
}

fn user_message(parts: Vec<Value>) -> Value {
    // A lone text part collapses to the plain string form.
    if parts.len() == 1
        && let Some(text) = parts[0].get("text").and_then(Value::as_str)
    {
        return json!({"role": "user", "content": text});
    }
    json!({"role": "user", "content": parts})
}

fn map_model_turn(content: &Value, names: &mut ToolNameMap, ids: &mut ToolIdQueue) -> Value {
    let mut text = String::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    if let Some(parts) = content.get("parts").and_then(Value::as_array) {
        for part in parts {
            if let Some(chunk) = part.get("text").and_then(Value::as_str) {
                text.push_str(chunk);
            }
            if let Some(call) = part.get("functionCall") {
                let name =
                    names.shorten(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
                tool_calls.push(json!({
                    "id": ids.push_call(),
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": args_string(call.get("args").unwrap_or(&Value::Null)),
                    },
                }));
            }
        }
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

fn map_tools(tools: Option<&Value>, names: &mut ToolNameMap) -> Option<Value> {
    let tools = tools?.as_array()?;
    let mut functions: Vec<Value> = Vec::new();
    for tool in tools {
        let Some(declarations) = tool.get("functionDeclarations").and_then(Value::as_array)
        else {
            continue;
        };
        for declaration in declarations {
            let Some(name) = declaration.get("name").and_then(Value::as_str) else {
                continue;
            };
            let mut function = json!({"name": names.shorten(name)});
            if let Some(description) = declaration.get("description") {
                function["description"] = description.clone();
            }
            function["parameters"] = declaration
                .get("parameters")
                .cloned()
                .unwrap_or_else(|| json!({"type": "object"}));
            functions.push(json!({"type": "function", "function": function}));
        }
    }
    if functions.is_empty() {
        None
    } else {
        Some(Value::Array(functions))
    }
}

fn map_tool_config(config: Option<&Value>, names: &mut ToolNameMap) -> Option<Value> {
    let calling = config?.get("functionCallingConfig")?;
    if let Some(allowed) = calling
        .get("allowedFunctionNames")
        .and_then(Value::as_array)
        && let Some(name) = allowed.first().and_then(Value::as_str)
    {
        return Some(json!({
            "type": "function",
            "function": {"name": names.shorten(name)},
        }));
    }
    match calling.get("mode").and_then(Value::as_str)? {
        "AUTO" => Some(json!("auto")),
        "ANY" => Some(json!("required")),
        "NONE" => Some(json!("none")),
        _ => None,
    }
}

fn map_thinking(config: Option<&Value>) -> Option<String> {
    let config = config?;
    if let Some(level) = config
        .get("thinkingLevel")
        .or_else(|| config.get("thinking_level"))
        .and_then(Value::as_str)
    {
        return Some(level.to_ascii_lowercase());
    }
    let budget = config
        .get("thinkingBudget")
        .or_else(|| config.get("thinking_budget"))
        .and_then(Value::as_i64)?;
    Some(match budget {
        0 => "none".to_string(),
        -1 => "auto".to_string(),
        n if n > 0 => level_for_budget(n).as_str().to_string(),
        _ => "auto".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_response_pairing_preserves_order() {
        let body = json!({
            "contents": [
                {"role": "model", "parts": [
                    {"functionCall": {"name": "first", "args": {}}},
                    {"functionCall": {"name": "second", "args": {}}}
                ]},
                {"role": "user", "parts": [
                    {"functionResponse": {"name": "first", "response": {"a": 1}}},
                    {"functionResponse": {"name": "second", "response": {"b": 2}}}
                ]}
            ]
        });
        let out = transform_request("gpt-5", body, false);
        let calls = out["messages"][0]["tool_calls"].as_array().unwrap();
        let first_id = calls[0]["id"].as_str().unwrap();
        let second_id = calls[1]["id"].as_str().unwrap();
        assert!(first_id.starts_with("toolu_"));
        assert_ne!(first_id, second_id);
        assert_eq!(out["messages"][1]["tool_call_id"].as_str().unwrap(), first_id);
        assert_eq!(out["messages"][2]["tool_call_id"].as_str().unwrap(), second_id);
    }

    #[test]
    fn generation_config_maps_to_knobs() {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
            "systemInstruction": {"parts": [{"text": "be kind"}]},
            "generationConfig": {
                "maxOutputTokens": 256,
                "temperature": 0.7,
                "topP": 0.9,
                "stopSequences": ["END"],
                "thinkingConfig": {"thinkingBudget": 9000}
            }
        });
        let out = transform_request("gpt-5", body, true);
        assert_eq!(out["messages"][0]["content"], json!("be kind"));
        assert_eq!(out["messages"][1]["content"], json!("hello"));
        assert_eq!(out["max_completion_tokens"], json!(256));
        assert_eq!(out["stop"], json!(["END"]));
        assert_eq!(out["reasoning_effort"], json!("high"));
        assert_eq!(out["stream"], json!(true));
    }

    #[test]
    fn declarations_flatten_to_function_tools() {
        let body = json!({
            "contents": [],
            "tools": [{"functionDeclarations": [
                {"name": "a", "description": "first", "parameters": {"type": "object"}},
                {"name": "b"}
            ]}],
            "toolConfig": {"functionCallingConfig": {"mode": "ANY"}}
        });
        let out = transform_request("gpt-5", body, false);
        assert_eq!(out["tools"].as_array().unwrap().len(), 2);
        assert_eq!(out["tools"][1]["function"]["parameters"], json!({"type": "object"}));
        assert_eq!(out["tool_choice"], json!("required"));
    }
}

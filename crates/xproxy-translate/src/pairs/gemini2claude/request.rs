use serde_json::{Value, json};

use xproxy_json::get_f64;

use crate::tool_ids::ToolIdQueue;

const DEFAULT_MAX_TOKENS: i64 = 4096;

/// Rewrite a Gemini generate-content request as a Claude create-message
/// request. Function calls get minted `toolu_` ids in order; the matching
/// `functionResponse` parts dequeue them so each tool_result references the
/// right tool_use.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut ids = ToolIdQueue::new();

    let mut messages: Vec<Value> = Vec::new();
    if let Some(contents) = body.get("contents").and_then(Value::as_array) {
        for content in contents {
            let role = content.get("role").and_then(Value::as_str).unwrap_or("user");
            if role == "model" {
                messages.push(map_model_turn(content, &mut ids));
            } else {
                messages.push(map_user_turn(content, &mut ids));
            }
        }
    }

    let config = body.get("generationConfig").cloned().unwrap_or(json!({}));

    let mut out = json!({
        "model": model,
        "messages": messages,
        "max_tokens": config
            .get("maxOutputTokens")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        "stream": stream,
    });

    if let Some(text) = system_text(&body) {
        out["system"] = json!(text);
    }
    if let Some(tools) = map_tools(body.get("tools")) {
        out["tools"] = tools;
    }
    if let Some(choice) = map_tool_config(body.get("toolConfig")) {
        out["tool_choice"] = choice;
    }
    // Gemini allows temperatures up to 2.0; Claude caps at 1.0.
    if let Some(temperature) = get_f64(&config, "temperature") {
        out["temperature"] = json!(temperature.min(1.0));
    }
    if let Some(top_p) = config.get("topP") {
        out["top_p"] = top_p.clone();
    }
    if let Some(stops) = config.get("stopSequences").and_then(Value::as_array)
        && !stops.is_empty()
    {
        out["stop_sequences"] = json!(stops);
    }
    if let Some(thinking) = map_thinking(config.get("thinkingConfig")) {
        out["thinking"] = thinking;
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

fn map_user_turn(content: &Value, ids: &mut ToolIdQueue) -> Value {
    let mut blocks: Vec<Value> = Vec::new();
    if let Some(parts) = content.get("parts").and_then(Value::as_array) {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                blocks.push(json!({"type": "text", "text": text}));
            }
            if let Some(data) = part.get("inlineData")
                && let (Some(mime), Some(payload)) = (
                    data.get("mimeType").and_then(Value::as_str),
                    data.get("data").and_then(Value::as_str),
                )
            {
                blocks.push(json!({
                    "type": "image",
                    "source": {"type": "base64", "media_type": mime, "data": payload},
                }));
            }
            if let Some(file) = part.get("fileData")
                && let Some(uri) = file.get("fileUri").and_then(Value::as_str)
            {
                blocks.push(json!({"type": "text", "text": format!("[file: {uri}]")}));
            }
            if let Some(response) = part.get("functionResponse") {
                let output = response
                    .get("response")
                    .map(Value::to_string)
                    .unwrap_or_else(|| "{}".to_string());
                blocks.push(json!({
                    "type": "tool_result",
                    "tool_use_id": ids.pop_response(),
                    "content": output,
                }));
            }
        }
    }
    json!({"role": "user", "content": blocks})
}

fn map_model_turn(content: &Value, ids: &mut ToolIdQueue) -> Value {
    let mut blocks: Vec<Value> = Vec::new();
    if let Some(parts) = content.get("parts").and_then(Value::as_array) {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                blocks.push(json!({"type": "text", "text": text}));
            }
            if let Some(call) = part.get("functionCall") {
                blocks.push(json!({
                    "type": "tool_use",
                    "id": ids.push_call(),
                    "name": call.get("name").cloned().unwrap_or(json!("tool")),
                    "input": call.get("args").cloned().unwrap_or(json!({})),
                }));
            }
        }
    }
    json!({"role": "assistant", "content": blocks})
}

fn map_tools(tools: Option<&Value>) -> Option<Value> {
    let tools = tools?.as_array()?;
    let mut mapped: Vec<Value> = Vec::new();
    for tool in tools {
        let Some(declarations) = tool.get("functionDeclarations").and_then(Value::as_array)
        else {
            continue;
        };
        for declaration in declarations {
            let Some(name) = declaration.get("name").and_then(Value::as_str) else {
                continue;
            };
            let mut entry = json!({
                "name": name,
                "input_schema": declaration
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object"})),
            });
            if let Some(description) = declaration.get("description") {
                entry["description"] = description.clone();
            }
            mapped.push(entry);
        }
    }
    if mapped.is_empty() {
        None
    } else {
        Some(Value::Array(mapped))
    }
}

fn map_tool_config(config: Option<&Value>) -> Option<Value> {
    let calling = config?.get("functionCallingConfig")?;
    if let Some(allowed) = calling
        .get("allowedFunctionNames")
        .and_then(Value::as_array)
        && let Some(name) = allowed.first().and_then(Value::as_str)
    {
        return Some(json!({"type": "tool", "name": name}));
    }
    match calling.get("mode").and_then(Value::as_str)? {
        "AUTO" => Some(json!({"type": "auto"})),
        "ANY" => Some(json!({"type": "any"})),
        "NONE" => Some(json!({"type": "none"})),
        _ => None,
    }
}

fn map_thinking(config: Option<&Value>) -> Option<Value> {
    let config = config?;
    if let Some(level) = config
        .get("thinkingLevel")
        .or_else(|| config.get("thinking_level"))
        .and_then(Value::as_str)
    {
        // Levels keep their meaning through the shared threshold table once
        // the thinking pipeline runs; emit the enabled shape it expects.
        return Some(match level.to_ascii_lowercase().as_str() {
            "none" => json!({"type": "disabled"}),
            _ => json!({"type": "enabled"}),
        });
    }
    let budget = config
        .get("thinkingBudget")
        .or_else(|| config.get("thinking_budget"))
        .and_then(Value::as_i64)?;
    Some(match budget {
        0 => json!({"type": "disabled"}),
        -1 => json!({"type": "enabled"}),
        n => json!({"type": "enabled", "budget_tokens": n}),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_ids_conserve_call_response_pairing() {
        let body = json!({
            "contents": [
                {"role": "model", "parts": [
                    {"functionCall": {"name": "a", "args": {}}},
                    {"functionCall": {"name": "b", "args": {}}}
                ]},
                {"role": "user", "parts": [
                    {"functionResponse": {"name": "a", "response": {"ok": 1}}},
                    {"functionResponse": {"name": "b", "response": {"ok": 2}}}
                ]}
            ]
        });
        let out = transform_request("claude-sonnet-4-5", body, false);
        let uses = out["messages"][0]["content"].as_array().unwrap();
        let results = out["messages"][1]["content"].as_array().unwrap();
        assert_eq!(uses[0]["id"], results[0]["tool_use_id"]);
        assert_eq!(uses[1]["id"], results[1]["tool_use_id"]);
        assert_ne!(uses[0]["id"], uses[1]["id"]);
    }

    #[test]
    fn defaults_and_config_map() {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": "hey"}]}],
            "systemInstruction": {"parts": [{"text": "calm"}]},
            "generationConfig": {"temperature": 0.1, "thinkingConfig": {"thinkingBudget": 2048}}
        });
        let out = transform_request("claude-sonnet-4-5", body, true);
        assert_eq!(out["max_tokens"], json!(4096));
        assert_eq!(out["system"], json!("calm"));
        assert_eq!(out["thinking"], json!({"type": "enabled", "budget_tokens": 2048}));
        assert_eq!(out["stream"], json!(true));
    }

    #[test]
    fn temperature_clamps_to_claude_range() {
        let body = json!({
            "contents": [],
            "generationConfig": {"temperature": 1.9}
        });
        let out = transform_request("claude-sonnet-4-5", body, false);
        assert_eq!(out["temperature"], json!(1.0));
    }

    #[test]
    fn declarations_become_claude_tools() {
        let body = json!({
            "contents": [],
            "tools": [{"functionDeclarations": [{
                "name": "find",
                "description": "Search",
                "parameters": {"type": "object", "properties": {"q": {"type": "string"}}}
            }]}],
            "toolConfig": {"functionCallingConfig": {"mode": "ANY"}}
        });
        let out = transform_request("claude-sonnet-4-5", body, false);
        assert_eq!(out["tools"][0]["name"], json!("find"));
        assert!(out["tools"][0]["input_schema"]["properties"]["q"].is_object());
        assert_eq!(out["tool_choice"], json!({"type": "any"}));
    }
}

use serde_json::{Value, json};

use xproxy_thinking::level_for_budget;

use crate::pairs::util::args_string;
use crate::tool_ids::ToolIdQueue;
use crate::tool_names::ToolNameMap;

/// Rewrite a Gemini generate-content request as a Responses-API request,
/// minting call ids in order so function_call_output items reference the
/// right calls.
pub fn transform_request(model: &str, body: Value, stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    let mut ids = ToolIdQueue::new();
    let mut input: Vec<Value> = Vec::new();

    if let Some(text) = system_text(&body) {
        input.push(json!({
            "type": "message",
            "role": "developer",
            "content": [{"type": "input_text", "text": text}],
        }));
    }

    if let Some(contents) = body.get("contents").and_then(Value::as_array) {
        for content in contents {
            let role = content.get("role").and_then(Value::as_str).unwrap_or("user");
            if role == "model" {
                map_model_turn(content, &mut input, &mut names, &mut ids);
            } else {
                map_user_turn(content, &mut input, &mut ids);
            }
        }
    }

    let config = body.get("generationConfig").cloned().unwrap_or(json!({}));

    let mut out = json!({
        "model": model,
        "input": input,
        "stream": stream,
        "store": false,
    });

    if let Some(max) = config.get("maxOutputTokens").and_then(Value::as_i64) {
        out["max_output_tokens"] = json!(max);
    }
    if let Some(temperature) = config.get("temperature") {
        out["temperature"] = temperature.clone();
    }
    if let Some(top_p) = config.get("topP") {
        out["top_p"] = top_p.clone();
    }
    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(effort) = map_thinking(config.get("thinkingConfig")) {
        out["reasoning"] = json!({"effort": effort});
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

fn map_user_turn(content: &Value, input: &mut Vec<Value>, ids: &mut ToolIdQueue) {
    let mut parts_out: Vec<Value> = Vec::new();
    if let Some(parts) = content.get("parts").and_then(Value::as_array) {
        for part in parts {
            if let Some(response) = part.get("functionResponse") {
                if !parts_out.is_empty() {
                    input.push(user_message(std::mem::take(&mut parts_out)));
                }
                input.push(json!({
                    "type": "function_call_output",
                    "call_id": ids.pop_response(),
                    "output": response
                        .get("response")
                        .map(Value::to_string)
                        .unwrap_or_else(|| "{}".to_string()),
                }));
                continue;
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                parts_out.push(json!({"type": "input_text", "text": text}));
            }
            if let Some(data) = part.get("inlineData")
                && let (Some(mime), Some(payload)) = (
                    data.get("mimeType").and_then(Value::as_str),
                    data.get("data").and_then(Value::as_str),
                )
            {
                parts_out.push(json!({
                    "type": "input_image",
                    "image_url": format!("data:{mime};base64,{payload}"),
                }));
            }
            if let Some(file) = part.get("fileData")
                && let Some(uri) = file.get("fileUri").and_then(Value::as_str)
            {
                parts_out.push(json!({"type": "input_text", "text": format!("[file: {uri}]")}));
            }
        }
    }
    if !parts_out.is_empty() {
        input.push(user_message(parts_out));
    }
}

fn user_message(parts: Vec<Value>) -> Value {
    json!({"type": "message", "role": "user", "content": parts})
}

fn map_model_turn(
    content: &Value,
    input: &mut Vec<Value>,
    names: &mut ToolNameMap,
    ids: &mut ToolIdQueue,
) {
    let mut text = String::new();
    if let Some(parts) = content.get("parts").and_then(Value::as_array) {
        for part in parts {
            if let Some(chunk) = part.get("text").and_then(Value::as_str) {
                text.push_str(chunk);
            }
            if let Some(call) = part.get("functionCall") {
                if !text.is_empty() {
                    input.push(json!({
                        "type": "message",
                        "role": "assistant",
                        "content": [{"type": "output_text", "text": std::mem::take(&mut text)}],
                    }));
                }
                let name =
                    names.shorten(call.get("name").and_then(Value::as_str).unwrap_or("tool"));
                input.push(json!({
                    "type": "function_call",
                    "call_id": ids.push_call(),
                    "name": name,
                    "arguments": args_string(call.get("args").unwrap_or(&Value::Null)),
                }));
            }
        }
    }
    if !text.is_empty() {
        input.push(json!({
            "type": "message",
            "role": "assistant",
            "content": [{"type": "output_text", "text": text}],
        }));
    }
}

fn map_tools(tools: Option<&Value>, names: &mut ToolNameMap) -> Option<Value> {
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
                "type": "function",
                "name": names.shorten(name),
                "parameters": declaration
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

use std::collections::HashMap;

use serde_json::{Value, json};

use xproxy_model::ThinkingLevel;

use crate::pairs::util::{parse_args, parse_data_url};
use crate::tool_names::ToolNameMap;

/// Rewrite an OpenAI chat-completions request as a Gemini generate-content
/// request.
pub fn transform_request(model: &str, body: Value, _stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    // Chat Completions pairs tool results with calls by id; Gemini pairs by
    // function name, so remember which id carried which name.
    let mut call_names: HashMap<String, String> = HashMap::new();

    let mut system_parts: Vec<Value> = Vec::new();
    let mut contents: Vec<Value> = Vec::new();

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        for message in messages {
            let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
            match role {
                "system" | "developer" => {
                    if let Some(text) = text_content(message.get("content")) {
                        system_parts.push(json!({"text": text}));
                    }
                }
                "assistant" => {
                    contents.push(map_assistant(message, &mut names, &mut call_names));
                }
                "tool" | "function" => {
                    contents.push(map_tool_result(message, &call_names));
                }
                _ => contents.push(map_user(message)),
            }
        }
    }

    let mut out = json!({
        "model": model,
        "contents": contents,
    });
    if !system_parts.is_empty() {
        out["systemInstruction"] = json!({"parts": system_parts});
    }

    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(config) = map_tool_choice(body.get("tool_choice"), &mut names) {
        out["toolConfig"] = config;
    }

    let generation = map_generation_config(&body);
    if !generation.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        out["generationConfig"] = generation;
    }

    out
}

fn map_user(message: &Value) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    match message.get("content") {
        Some(Value::String(text)) => parts.push(json!({"text": text})),
        Some(Value::Array(chunks)) => {
            for chunk in chunks {
                match chunk.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                            parts.push(json!({"text": text}));
                        }
                    }
                    Some("image_url") => {
                        let url = chunk
                            .pointer("/image_url/url")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        match parse_data_url(url) {
                            Some((mime, data)) => parts.push(json!({
                                "inlineData": {"mimeType": mime, "data": data},
                            })),
                            None => parts.push(json!({
                                "fileData": {"fileUri": url},
                            })),
                        }
                    }
                    Some("file") => {
                        let name = chunk
                            .pointer("/file/filename")
                            .or_else(|| chunk.pointer("/file/file_id"))
                            .and_then(Value::as_str)
                            .unwrap_or("attachment");
                        parts.push(json!({"text": format!("[file: {name}]")}));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    json!({"role": "user", "parts": parts})
}

fn map_assistant(
    message: &Value,
    names: &mut ToolNameMap,
    call_names: &mut HashMap<String, String>,
) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    if let Some(text) = text_content(message.get("content"))
        && !text.is_empty()
    {
        parts.push(json!({"text": text}));
    }
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let name = names.shorten(
                call.pointer("/function/name")
                    .and_then(Value::as_str)
                    .unwrap_or("tool"),
            );
            if let Some(id) = call.get("id").and_then(Value::as_str) {
                call_names.insert(id.to_string(), name.clone());
            }
            let arguments = call
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            parts.push(json!({
                "functionCall": {"name": name, "args": parse_args(arguments)},
            }));
        }
    }
    json!({"role": "model", "parts": parts})
}

fn map_tool_result(message: &Value, call_names: &HashMap<String, String>) -> Value {
    let id = message
        .get("tool_call_id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let name = call_names
        .get(id)
        .cloned()
        .or_else(|| {
            message
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "tool".to_string());
    let text = text_content(message.get("content")).unwrap_or_default();
    let response = serde_json::from_str::<Value>(&text)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({"result": text}));
    json!({
        "role": "user",
        "parts": [{"functionResponse": {"name": name, "response": response}}],
    })
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
    let declarations: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            let function = tool.get("function")?;
            let name = names.shorten(function.get("name")?.as_str()?);
            let mut declaration = json!({"name": name});
            if let Some(description) = function.get("description") {
                declaration["description"] = description.clone();
            }
            if let Some(parameters) = function.get("parameters") {
                declaration["parameters"] = parameters.clone();
            }
            Some(declaration)
        })
        .collect();
    if declarations.is_empty() {
        None
    } else {
        Some(json!([{"functionDeclarations": declarations}]))
    }
}

fn map_tool_choice(choice: Option<&Value>, names: &mut ToolNameMap) -> Option<Value> {
    let mode = match choice? {
        Value::String(mode) => match mode.as_str() {
            "auto" => json!({"mode": "AUTO"}),
            "required" => json!({"mode": "ANY"}),
            "none" => json!({"mode": "NONE"}),
            _ => return None,
        },
        named => {
            let name = names.shorten(named.pointer("/function/name")?.as_str()?);
            json!({"mode": "ANY", "allowedFunctionNames": [name]})
        }
    };
    Some(json!({"functionCallingConfig": mode}))
}

fn map_generation_config(body: &Value) -> Value {
    let mut config = json!({});
    if let Some(max) = body
        .get("max_completion_tokens")
        .or_else(|| body.get("max_tokens"))
        .and_then(Value::as_i64)
    {
        config["maxOutputTokens"] = json!(max);
    }
    if let Some(temperature) = body.get("temperature") {
        config["temperature"] = temperature.clone();
    }
    if let Some(top_p) = body.get("top_p") {
        config["topP"] = top_p.clone();
    }
    match body.get("stop") {
        Some(Value::String(single)) => config["stopSequences"] = json!([single]),
        Some(Value::Array(many)) if !many.is_empty() => {
            config["stopSequences"] = json!(many);
        }
        _ => {}
    }
    if let Some(thinking) = map_thinking(body.get("reasoning_effort")) {
        config["thinkingConfig"] = thinking;
    }
    config
}

fn map_thinking(effort: Option<&Value>) -> Option<Value> {
    let effort = effort?.as_str()?;
    match effort.to_ascii_lowercase().as_str() {
        "none" => Some(json!({"thinkingBudget": 0})),
        "auto" => Some(json!({"thinkingBudget": -1})),
        other => {
            let level = ThinkingLevel::parse(other)?;
            Some(json!({"thinkingLevel": level.as_str()}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_and_system_map() {
        let body = json!({
            "messages": [
                {"role": "system", "content": "short answers"},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ],
            "max_tokens": 512,
            "temperature": 0.2
        });
        let out = transform_request("gemini-2.5-pro", body, true);
        assert_eq!(out["systemInstruction"]["parts"][0]["text"], json!("short answers"));
        assert_eq!(out["contents"][0]["role"], json!("user"));
        assert_eq!(out["contents"][1]["role"], json!("model"));
        assert_eq!(out["generationConfig"]["maxOutputTokens"], json!(512));
    }

    #[test]
    fn tool_calls_pair_by_name() {
        let body = json!({
            "messages": [
                {"role": "assistant", "tool_calls": [{
                    "id": "call_7",
                    "type": "function",
                    "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}
                }]},
                {"role": "tool", "tool_call_id": "call_7", "content": "{\"temp\": -3}"}
            ]
        });
        let out = transform_request("gemini-2.5-pro", body, false);
        let call = &out["contents"][0]["parts"][0]["functionCall"];
        assert_eq!(call["name"], json!("weather"));
        assert_eq!(call["args"], json!({"city": "Oslo"}));
        let response = &out["contents"][1]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], json!("weather"));
        assert_eq!(response["response"], json!({"temp": -3}));
    }

    #[test]
    fn non_json_tool_output_wraps_in_result() {
        let body = json!({
            "messages": [
                {"role": "tool", "tool_call_id": "x", "content": "plain words"}
            ]
        });
        let out = transform_request("gemini-2.5-pro", body, false);
        assert_eq!(
            out["contents"][0]["parts"][0]["functionResponse"]["response"],
            json!({"result": "plain words"})
        );
    }

    #[test]
    fn effort_maps_to_thinking_config() {
        let body = json!({"messages": [], "reasoning_effort": "high"});
        let out = transform_request("gemini-2.5-pro", body, false);
        assert_eq!(
            out["generationConfig"]["thinkingConfig"],
            json!({"thinkingLevel": "high"})
        );

        let auto = json!({"messages": [], "reasoning_effort": "auto"});
        let out = transform_request("gemini-2.5-pro", auto, false);
        assert_eq!(
            out["generationConfig"]["thinkingConfig"],
            json!({"thinkingBudget": -1})
        );
    }
}

use std::collections::HashMap;

use serde_json::{Value, json};

use xproxy_model::ThinkingLevel;

use crate::tool_names::ToolNameMap;

/// Rewrite a Claude create-message request as a Gemini generate-content
/// request. Claude pairs tool results with calls by id; Gemini pairs by
/// name, so the id→name association is carried across turns.
pub fn transform_request(model: &str, body: Value, _stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    let mut call_names: HashMap<String, String> = HashMap::new();

    let mut contents: Vec<Value> = Vec::new();
    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        for message in messages {
            let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
            if role == "assistant" {
                contents.push(map_assistant(message.get("content"), &mut names, &mut call_names));
            } else {
                contents.push(map_user(message.get("content"), &call_names));
            }
        }
    }

    let mut out = json!({
        "model": model,
        "contents": contents,
    });

    if let Some(system) = map_system(body.get("system")) {
        out["systemInstruction"] = system;
    }
    if let Some(tools) = map_tools(body.get("tools"), &mut names) {
        out["tools"] = tools;
    }
    if let Some(config) = map_tool_choice(body.get("tool_choice"), &mut names) {
        out["toolConfig"] = config;
    }

    let mut generation = json!({});
    if let Some(max) = body.get("max_tokens").and_then(Value::as_i64) {
        generation["maxOutputTokens"] = json!(max);
    }
    if let Some(temperature) = body.get("temperature") {
        generation["temperature"] = temperature.clone();
    }
    if let Some(top_p) = body.get("top_p") {
        generation["topP"] = top_p.clone();
    }
    if let Some(stops) = body.get("stop_sequences").and_then(Value::as_array)
        && !stops.is_empty()
    {
        generation["stopSequences"] = json!(stops);
    }
    if let Some(thinking) = map_thinking(body.get("thinking")) {
        generation["thinkingConfig"] = thinking;
    }
    if !generation.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        out["generationConfig"] = generation;
    }

    out
}

fn map_system(system: Option<&Value>) -> Option<Value> {
    let text = match system? {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join("\n"),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(json!({"parts": [{"text": text}]}))
    }
}

fn map_user(content: Option<&Value>, call_names: &HashMap<String, String>) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    match content {
        Some(Value::String(text)) => parts.push(json!({"text": text})),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            parts.push(json!({"text": text}));
                        }
                    }
                    Some("image") => {
                        if let Some(part) = map_image(block.get("source")) {
                            parts.push(part);
                        }
                    }
                    Some("tool_result") => {
                        let id = block
                            .get("tool_use_id")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        let name = call_names
                            .get(id)
                            .cloned()
                            .unwrap_or_else(|| "tool".to_string());
                        parts.push(json!({
                            "functionResponse": {
                                "name": name,
                                "response": {"result": tool_result_text(block.get("content"))},
                            },
                        }));
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
    content: Option<&Value>,
    names: &mut ToolNameMap,
    call_names: &mut HashMap<String, String>,
) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    match content {
        Some(Value::String(text)) => parts.push(json!({"text": text})),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            parts.push(json!({"text": text}));
                        }
                    }
                    Some("tool_use") => {
                        let name = names.shorten(
                            block.get("name").and_then(Value::as_str).unwrap_or("tool"),
                        );
                        if let Some(id) = block.get("id").and_then(Value::as_str) {
                            call_names.insert(id.to_string(), name.clone());
                        }
                        parts.push(json!({
                            "functionCall": {
                                "name": name,
                                "args": block.get("input").cloned().unwrap_or(json!({})),
                            },
                        }));
                    }
                    // Historical thinking blocks are not replayed upstream.
                    _ => {}
                }
            }
        }
        _ => {}
    }
    json!({"role": "model", "parts": parts})
}

fn map_image(source: Option<&Value>) -> Option<Value> {
    let source = source?;
    match source.get("type").and_then(Value::as_str)? {
        "base64" => Some(json!({
            "inlineData": {
                "mimeType": source.get("media_type").cloned().unwrap_or(json!("image/png")),
                "data": source.get("data").cloned().unwrap_or(json!("")),
            },
        })),
        "url" => {
            let url = source.get("url").and_then(Value::as_str)?;
            Some(json!({"fileData": {"fileUri": url}}))
        }
        _ => None,
    }
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
    let declarations: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            let name = names.shorten(tool.get("name")?.as_str()?);
            let mut declaration = json!({"name": name});
            if let Some(description) = tool.get("description") {
                declaration["description"] = description.clone();
            }
            if let Some(schema) = tool.get("input_schema") {
                declaration["parameters"] = schema.clone();
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
    let choice = choice?;
    let config = match choice.get("type").and_then(Value::as_str)? {
        "auto" => json!({"mode": "AUTO"}),
        "any" => json!({"mode": "ANY"}),
        "none" => json!({"mode": "NONE"}),
        "tool" => {
            let name = names.shorten(choice.get("name")?.as_str()?);
            json!({"mode": "ANY", "allowedFunctionNames": [name]})
        }
        _ => return None,
    };
    Some(json!({"functionCallingConfig": config}))
}

fn map_thinking(thinking: Option<&Value>) -> Option<Value> {
    let thinking = thinking?;
    match thinking.get("type").and_then(Value::as_str)? {
        "disabled" => Some(json!({"thinkingBudget": 0})),
        "adaptive" => Some(json!({"thinkingLevel": ThinkingLevel::XHigh.as_str()})),
        "enabled" => match thinking.get("budget_tokens").and_then(Value::as_i64) {
            Some(budget) => Some(json!({"thinkingBudget": budget})),
            None => Some(json!({"thinkingBudget": -1})),
        },
        _ => None,
    }
}

use std::collections::HashMap;

use serde_json::{Value, json};

use xproxy_model::ThinkingLevel;

use crate::pairs::util::{parse_args, parse_data_url};
use crate::tool_names::ToolNameMap;

/// Rewrite a Responses-API request as a Gemini generate-content request.
/// Gemini pairs tool output with calls by function name, so the call_id→name
/// association from function_call items is reused for the outputs.
pub fn transform_request(model: &str, body: Value, _stream: bool) -> Value {
    let mut names = ToolNameMap::new();
    let mut call_names: HashMap<String, String> = HashMap::new();

    let mut system_parts: Vec<Value> = Vec::new();
    if let Some(instructions) = body.get("instructions").and_then(Value::as_str)
        && !instructions.is_empty()
    {
        system_parts.push(json!({"text": instructions}));
    }

    let mut contents: Vec<Value> = Vec::new();
    match body.get("input") {
        Some(Value::String(prompt)) => {
            contents.push(json!({"role": "user", "parts": [{"text": prompt}]}));
        }
        Some(Value::Array(items)) => {
            for item in items {
                map_item(
                    item,
                    &mut contents,
                    &mut system_parts,
                    &mut names,
                    &mut call_names,
                );
            }
        }
        _ => {}
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

    let mut generation = json!({});
    if let Some(max) = body.get("max_output_tokens").and_then(Value::as_i64) {
        generation["maxOutputTokens"] = json!(max);
    }
    if let Some(temperature) = body.get("temperature") {
        generation["temperature"] = temperature.clone();
    }
    if let Some(top_p) = body.get("top_p") {
        generation["topP"] = top_p.clone();
    }
    if let Some(thinking) = map_thinking(body.pointer("/reasoning/effort")) {
        generation["thinkingConfig"] = thinking;
    }
    if !generation.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        out["generationConfig"] = generation;
    }

    out
}

fn map_item(
    item: &Value,
    contents: &mut Vec<Value>,
    system_parts: &mut Vec<Value>,
    names: &mut ToolNameMap,
    call_names: &mut HashMap<String, String>,
) {
    match item.get("type").and_then(Value::as_str) {
        Some("message") | None => {
            let role = item.get("role").and_then(Value::as_str).unwrap_or("user");
            match role {
                "developer" | "system" => {
                    if let Some(text) = text_content(item.get("content")) {
                        system_parts.push(json!({"text": text}));
                    }
                }
                "assistant" => {
                    if let Some(text) = text_content(item.get("content"))
                        && !text.is_empty()
                    {
                        contents.push(json!({"role": "model", "parts": [{"text": text}]}));
                    }
                }
                _ => {
                    let parts = user_parts(item.get("content"));
                    if !parts.is_empty() {
                        contents.push(json!({"role": "user", "parts": parts}));
                    }
                }
            }
        }
        Some("function_call") => {
            let name = names.shorten(item.get("name").and_then(Value::as_str).unwrap_or("tool"));
            if let Some(id) = item.get("call_id").and_then(Value::as_str) {
                call_names.insert(id.to_string(), name.clone());
            }
            contents.push(json!({
                "role": "model",
                "parts": [{"functionCall": {
                    "name": name,
                    "args": parse_args(
                        item.get("arguments").and_then(Value::as_str).unwrap_or("{}"),
                    ),
                }}],
            }));
        }
        Some("function_call_output") => {
            let id = item
                .get("call_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let name = call_names
                .get(id)
                .cloned()
                .unwrap_or_else(|| "tool".to_string());
            let output = item
                .get("output")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let response = serde_json::from_str::<Value>(output)
                .ok()
                .filter(Value::is_object)
                .unwrap_or_else(|| json!({"result": output}));
            contents.push(json!({
                "role": "user",
                "parts": [{"functionResponse": {"name": name, "response": response}}],
            }));
        }
        _ => {}
    }
}

fn user_parts(content: Option<&Value>) -> Vec<Value> {
    let mut parts: Vec<Value> = Vec::new();
    match content {
        Some(Value::String(text)) => parts.push(json!({"text": text})),
        Some(Value::Array(chunks)) => {
            for chunk in chunks {
                match chunk.get("type").and_then(Value::as_str) {
                    Some("input_text") | Some("output_text") | Some("text") => {
                        if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                            parts.push(json!({"text": text}));
                        }
                    }
                    Some("input_image") => {
                        if let Some(url) = chunk
                            .get("image_url")
                            .and_then(Value::as_str)
                            .or_else(|| chunk.pointer("/image_url/url").and_then(Value::as_str))
                        {
                            parts.push(match parse_data_url(url) {
                                Some((mime, data)) => json!({
                                    "inlineData": {"mimeType": mime, "data": data},
                                }),
                                None => json!({"fileData": {"fileUri": url}}),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    parts
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
            if tool.get("type").and_then(Value::as_str) != Some("function") {
                return None;
            }
            let name = names.shorten(tool.get("name")?.as_str()?);
            let mut declaration = json!({"name": name});
            if let Some(description) = tool.get("description") {
                declaration["description"] = description.clone();
            }
            if let Some(parameters) = tool.get("parameters") {
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
    fn items_map_to_contents() {
        let body = json!({
            "instructions": "steady",
            "input": [
                {"type": "message", "role": "user", "content": [
                    {"type": "input_text", "text": "begin"}
                ]},
                {"type": "function_call", "call_id": "c2", "name": "list", "arguments": "{}"},
                {"type": "function_call_output", "call_id": "c2", "output": "{\"n\":3}"}
            ],
            "reasoning": {"effort": "medium"},
            "max_output_tokens": 333
        });
        let out = transform_request("gemini-2.5-pro", body, false);
        assert_eq!(out["systemInstruction"]["parts"][0]["text"], json!("steady"));
        assert_eq!(out["contents"][0]["parts"][0]["text"], json!("begin"));
        assert_eq!(
            out["contents"][1]["parts"][0]["functionCall"]["name"],
            json!("list")
        );
        let response = &out["contents"][2]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], json!("list"));
        assert_eq!(response["response"], json!({"n": 3}));
        assert_eq!(
            out["generationConfig"]["thinkingConfig"],
            json!({"thinkingLevel": "medium"})
        );
        assert_eq!(out["generationConfig"]["maxOutputTokens"], json!(333));
    }
}

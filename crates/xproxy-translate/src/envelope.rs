use serde_json::{Value, json};

/// Wrap a Gemini request body in the `{"model", "request"}` envelope the
/// gemini-cli and antigravity endpoints expect.
pub fn wrap_request(body: Value, model: &str) -> Value {
    json!({
        "model": model,
        "request": body,
    })
}

/// Unwrap the envelope back to a plain Gemini body. Non-enveloped input is
/// returned untouched.
pub fn unwrap_request(mut body: Value) -> Value {
    match body
        .as_object_mut()
        .and_then(|map| map.shift_remove("request"))
    {
        Some(inner) => inner,
        None => body,
    }
}

/// Enveloped endpoints wrap every stream chunk in `{"response": ...}`;
/// give the inner chunk back as a string for the plain Gemini translators.
pub fn unwrap_chunk(chunk: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(chunk) else {
        return chunk.to_string();
    };
    match parsed.get("response") {
        Some(inner) => inner.to_string(),
        None => chunk.to_string(),
    }
}

/// Same unwrap for a complete (non-streaming) enveloped response document.
pub fn unwrap_response(mut body: Value) -> Value {
    match body
        .as_object_mut()
        .and_then(|map| map.shift_remove("response"))
    {
        Some(inner) => inner,
        None => body,
    }
}

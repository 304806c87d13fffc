use serde_json::{Value, json};

use xproxy_json::{delete_path, set_path};

use crate::types::ThinkingMode;

use super::Applied;

/// iFlow models take a boolean toggle rather than budgets or levels, and the
/// field it lives in depends on the model family. The OpenAI-style
/// `reasoning_effort` the request may have carried is consumed here.
pub(super) fn apply(mut body: Value, applied: &Applied) -> Value {
    if !applied.permissive && applied.model.thinking.is_none() {
        return body;
    }

    let enable = applied.config.mode != ThinkingMode::None;
    let id = applied.model.id.to_ascii_lowercase();

    delete_path(&mut body, "reasoning_effort");

    if id.contains("minimax") {
        set_path(&mut body, "reasoning_split", json!(enable));
        delete_path(&mut body, "chat_template_kwargs.clear_thinking");
        return body;
    }

    set_path(&mut body, "chat_template_kwargs.enable_thinking", json!(enable));
    if id.contains("glm") {
        set_path(&mut body, "chat_template_kwargs.clear_thinking", json!(false));
    } else {
        delete_path(&mut body, "chat_template_kwargs.clear_thinking");
    }
    body
}

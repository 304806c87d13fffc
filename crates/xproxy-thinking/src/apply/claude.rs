use serde_json::{Value, json};

use xproxy_json::{delete_path, get_i64, set_path};

use crate::types::{ThinkingMode, budget_for_level};

use super::Applied;

/// Serialize the resolved configuration into a Claude create-message body.
///
/// Invariant enforced here: `budget_tokens` must stay strictly below the
/// effective `max_tokens`, whether that cap came from the request or from the
/// model's default completion limit.
pub(super) fn apply(mut body: Value, applied: &Applied) -> Value {
    if !applied.permissive && applied.model.thinking.is_none() {
        return body;
    }

    match applied.config.mode {
        ThinkingMode::None => {
            set_path(&mut body, "thinking.type", json!("disabled"));
            delete_path(&mut body, "thinking.budget_tokens");
            body
        }
        ThinkingMode::Auto => {
            // Enabled without a fixed budget lets the model pick.
            set_path(&mut body, "thinking.type", json!("enabled"));
            delete_path(&mut body, "thinking.budget_tokens");
            body
        }
        ThinkingMode::Budget => write_budget(body, applied, applied.config.budget),
        ThinkingMode::Level => {
            let max_cap = applied
                .model
                .thinking
                .as_ref()
                .map(|support| support.max_budget)
                .unwrap_or(0);
            let budget = applied
                .config
                .level
                .map(|level| budget_for_level(level, max_cap))
                .unwrap_or(0);
            write_budget(body, applied, budget)
        }
    }
}

fn write_budget(mut body: Value, applied: &Applied, mut budget: i64) -> Value {
    let request_max = get_i64(&body, "max_tokens");
    let effective_max = request_max.or(applied.model.max_completion_tokens);

    if let Some(max) = effective_max
        && budget >= max
    {
        let reduced = max - 1;
        let min = applied
            .model
            .thinking
            .as_ref()
            .map(|support| support.min_budget)
            .unwrap_or(0);
        if reduced < min {
            // Cannot satisfy both the cap and the model minimum; forwarding
            // the request untouched beats inventing numbers.
            return body;
        }
        budget = reduced;
        if request_max.is_none() {
            set_path(&mut body, "max_tokens", json!(max));
        }
    }

    set_path(&mut body, "thinking.type", json!("enabled"));
    set_path(&mut body, "thinking.budget_tokens", json!(budget));
    body
}

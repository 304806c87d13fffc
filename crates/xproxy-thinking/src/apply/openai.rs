use serde_json::{Value, json};

use xproxy_json::set_path;
use xproxy_model::{ThinkingLevel, ThinkingSupport};

use crate::types::{ThinkingMode, level_for_budget};

use super::Applied;

enum Effort {
    None,
    Auto,
    Level(ThinkingLevel),
}

pub(super) fn apply_openai(body: Value, applied: &Applied) -> Value {
    apply_effort(body, applied, "reasoning_effort", true)
}

pub(super) fn apply_codex(body: Value, applied: &Applied) -> Value {
    apply_effort(body, applied, "reasoning.effort", false)
}

/// Serialize the resolved configuration as a string effort level. Chat
/// Completions rejects `xhigh`, `minimal` and `auto`, so those are clamped to
/// the nearest value the schema takes; the Responses schema only rejects
/// `auto` and caps `xhigh` to models that actually list it.
fn apply_effort(mut body: Value, applied: &Applied, path: &str, chat_schema: bool) -> Value {
    if !applied.permissive && applied.model.thinking.is_none() {
        return body;
    }

    let support = applied.model.thinking.as_ref();
    let config = applied.config;

    let effort = match config.mode {
        ThinkingMode::None => {
            let none_supported =
                applied.permissive || support.map(|s| s.zero_allowed).unwrap_or(true);
            if none_supported {
                Effort::None
            } else {
                Effort::Level(
                    support
                        .and_then(ThinkingSupport::lowest_level)
                        .unwrap_or(ThinkingLevel::Minimal),
                )
            }
        }
        ThinkingMode::Auto => Effort::Auto,
        ThinkingMode::Budget => {
            let canonical = level_for_budget(config.budget);
            let level = support
                .filter(|s| s.has_levels())
                .and_then(|s| canonical.nearest_in(&s.levels))
                .unwrap_or(canonical);
            Effort::Level(level)
        }
        ThinkingMode::Level => Effort::Level(config.level.unwrap_or(ThinkingLevel::Medium)),
    };

    let value = match effort {
        Effort::None => "none",
        Effort::Auto => "medium",
        Effort::Level(level) => {
            if chat_schema {
                match level {
                    ThinkingLevel::XHigh => "high",
                    ThinkingLevel::Minimal => "low",
                    other => other.as_str(),
                }
            } else if level == ThinkingLevel::XHigh
                && !applied.permissive
                && !support.map(|s| s.supports_level(level)).unwrap_or(false)
            {
                "high"
            } else {
                level.as_str()
            }
        }
    };

    set_path(&mut body, path, json!(value));
    body
}

use serde_json::{Value, json};

use xproxy_json::{delete_path, get_bool, get_i64, get_path, set_path};
use xproxy_model::ThinkingLevel;

use crate::types::ThinkingMode;

use super::Applied;

pub(super) fn apply_gemini(body: Value, applied: &Applied) -> Value {
    apply_shape(body, applied, "", false)
}

pub(super) fn apply_gemini_cli(body: Value, applied: &Applied) -> Value {
    apply_shape(body, applied, "request.", false)
}

pub(super) fn apply_antigravity(body: Value, applied: &Applied) -> Value {
    apply_shape(body, applied, "request.", true)
}

/// Serialize the resolved configuration into a Gemini `thinkingConfig`.
///
/// The upstream treats `thinkingBudget` and `thinkingLevel` as a oneof, so
/// whichever side is emitted, the other is deleted. Snake-case spellings the
/// client may have sent are folded into camelCase first.
fn apply_shape(mut body: Value, applied: &Applied, prefix: &str, antigravity: bool) -> Value {
    if !applied.permissive && applied.model.thinking.is_none() {
        return body;
    }

    normalize_container(&mut body, prefix);

    let base = format!("{prefix}generationConfig.thinkingConfig");
    let budget_path = format!("{base}.thinkingBudget");
    let level_path = format!("{base}.thinkingLevel");
    let include_path = format!("{base}.includeThoughts");

    let user_include = get_bool(&body, &include_path);
    let support = applied.model.thinking.as_ref();
    let level_capable = support.map(|s| s.has_levels()).unwrap_or(false);
    let config = applied.config;

    match config.mode {
        ThinkingMode::Auto => {
            set_path(&mut body, &budget_path, json!(-1));
            delete_path(&mut body, &level_path);
        }
        ThinkingMode::Budget => {
            set_path(&mut body, &budget_path, json!(config.budget));
            delete_path(&mut body, &level_path);
        }
        ThinkingMode::Level => {
            let level = config.level.unwrap_or(ThinkingLevel::Medium);
            set_path(&mut body, &level_path, json!(level.as_str()));
            delete_path(&mut body, &budget_path);
        }
        ThinkingMode::None => {
            if level_capable {
                // Disabled but the model only speaks levels: carry a valid
                // level and rely on includeThoughts=false below.
                let level = applied
                    .carry_level
                    .or_else(|| support.and_then(|s| s.lowest_level()))
                    .unwrap_or(ThinkingLevel::Minimal);
                set_path(&mut body, &level_path, json!(level.as_str()));
                delete_path(&mut body, &budget_path);
            } else {
                set_path(&mut body, &budget_path, json!(config.budget));
                delete_path(&mut body, &level_path);
            }
        }
    }

    let include = user_include.unwrap_or(match config.mode {
        ThinkingMode::None => false,
        ThinkingMode::Auto | ThinkingMode::Level => true,
        ThinkingMode::Budget => config.budget > 0,
    });
    set_path(&mut body, &include_path, json!(include));

    if antigravity && applied.model.id.to_ascii_lowercase().contains("claude") {
        enforce_claude_cap(&mut body, applied, prefix, &base, &budget_path);
    }

    body
}

/// Fold `generation_config.thinking_config` (and snake-case leaves inside the
/// camel container) into the canonical camelCase spelling.
fn normalize_container(body: &mut Value, prefix: &str) {
    let snake = format!("{prefix}generation_config.thinking_config");
    let camel = format!("{prefix}generationConfig.thinkingConfig");

    if let Some(container) = get_path(body, &snake).cloned() {
        delete_path(body, &snake);
        let parent = format!("{prefix}generation_config");
        if get_path(body, &parent)
            .and_then(Value::as_object)
            .is_some_and(|map| map.is_empty())
        {
            delete_path(body, &parent);
        }
        if let Some(map) = container.as_object() {
            for (key, value) in map {
                set_path(body, &format!("{camel}.{key}"), value.clone());
            }
        }
    }

    for (snake_key, camel_key) in [
        ("thinking_budget", "thinkingBudget"),
        ("thinking_level", "thinkingLevel"),
        ("include_thoughts", "includeThoughts"),
    ] {
        let from = format!("{camel}.{snake_key}");
        if let Some(value) = get_path(body, &from).cloned() {
            delete_path(body, &from);
            let to = format!("{camel}.{camel_key}");
            if get_path(body, &to).is_none() {
                set_path(body, &to, value);
            }
        }
    }
}

/// Antigravity routes Claude models through the Gemini schema; the Claude
/// budget-below-max invariant still applies. When it cannot be satisfied the
/// whole thinkingConfig is dropped instead of sending an impossible pair.
fn enforce_claude_cap(
    body: &mut Value,
    applied: &Applied,
    prefix: &str,
    base: &str,
    budget_path: &str,
) {
    let Some(budget) = get_i64(body, budget_path).filter(|b| *b > 0) else {
        return;
    };

    let max_path = format!("{prefix}generationConfig.maxOutputTokens");
    let request_max = get_i64(body, &max_path);
    let Some(max) = request_max.or(applied.model.max_completion_tokens) else {
        return;
    };
    if budget < max {
        return;
    }

    let reduced = max - 1;
    let min = applied
        .model
        .thinking
        .as_ref()
        .map(|support| support.min_budget)
        .unwrap_or(0);
    if reduced < min {
        delete_path(body, base);
        return;
    }
    set_path(body, budget_path, json!(reduced));
    if request_max.is_none() {
        set_path(body, &max_path, json!(max));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use xproxy_common::Dialect;
    use xproxy_model::{ModelInfo, ThinkingSupport};

    use super::*;
    use crate::types::ThinkingConfig;

    fn applied(target: Dialect, config: ThinkingConfig, model: ModelInfo) -> Applied {
        Applied {
            target,
            config,
            carry_level: None,
            model: Arc::new(model),
            permissive: false,
        }
    }

    fn budget_model(id: &str, min: i64, max: i64) -> ModelInfo {
        ModelInfo {
            id: id.to_string(),
            provider: "gemini".to_string(),
            user_defined: false,
            max_completion_tokens: Some(65536),
            thinking: Some(ThinkingSupport {
                min_budget: min,
                max_budget: max,
                levels: Vec::new(),
                zero_allowed: true,
                dynamic_allowed: true,
            }),
        }
    }

    fn level_model(levels: &[ThinkingLevel]) -> ModelInfo {
        ModelInfo {
            id: "gemini-3-pro".to_string(),
            provider: "gemini".to_string(),
            user_defined: false,
            max_completion_tokens: None,
            thinking: Some(ThinkingSupport {
                min_budget: 0,
                max_budget: 0,
                levels: levels.to_vec(),
                zero_allowed: false,
                dynamic_allowed: true,
            }),
        }
    }

    #[test]
    fn budget_deletes_level_and_defaults_include() {
        let body = json!({"generationConfig": {"thinkingConfig": {"thinkingLevel": "low"}}});
        let out = apply_gemini(
            body,
            &applied(
                Dialect::Gemini,
                ThinkingConfig::budget(2048),
                budget_model("gemini-2.5-flash", 0, 24576),
            ),
        );
        assert_eq!(
            out["generationConfig"]["thinkingConfig"],
            json!({"thinkingBudget": 2048, "includeThoughts": true})
        );
    }

    #[test]
    fn auto_writes_dynamic_budget() {
        let out = apply_gemini(
            json!({}),
            &applied(
                Dialect::Gemini,
                ThinkingConfig::auto(),
                budget_model("gemini-2.5-flash", 0, 24576),
            ),
        );
        assert_eq!(out["generationConfig"]["thinkingConfig"]["thinkingBudget"], json!(-1));
        assert_eq!(out["generationConfig"]["thinkingConfig"]["includeThoughts"], json!(true));
    }

    #[test]
    fn none_on_level_model_keeps_a_valid_level() {
        let mut request = applied(
            Dialect::Gemini,
            ThinkingConfig::none(),
            level_model(&[ThinkingLevel::Low, ThinkingLevel::High]),
        );
        request.carry_level = Some(ThinkingLevel::Low);
        let out = apply_gemini(json!({}), &request);
        assert_eq!(
            out["generationConfig"]["thinkingConfig"],
            json!({"thinkingLevel": "low", "includeThoughts": false})
        );
    }

    #[test]
    fn user_include_thoughts_wins() {
        let body = json!({"generationConfig": {"thinkingConfig": {"include_thoughts": true}}});
        let out = apply_gemini(
            body,
            &applied(
                Dialect::Gemini,
                ThinkingConfig::none(),
                budget_model("gemini-2.5-flash", 0, 24576),
            ),
        );
        let config = &out["generationConfig"]["thinkingConfig"];
        assert_eq!(config["includeThoughts"], json!(true));
        assert!(config.get("include_thoughts").is_none());
    }

    #[test]
    fn snake_container_is_normalized() {
        let body = json!({"generation_config": {"thinking_config": {"thinking_budget": 4096}}});
        let out = apply_gemini(
            body,
            &applied(
                Dialect::Gemini,
                ThinkingConfig::budget(4096),
                budget_model("gemini-2.5-flash", 0, 24576),
            ),
        );
        assert!(out.get("generation_config").is_none());
        assert_eq!(
            out["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            json!(4096)
        );
    }

    #[test]
    fn cli_prefix_addresses_the_envelope() {
        let body = json!({"model": "m", "request": {}});
        let out = apply_gemini_cli(
            body,
            &applied(
                Dialect::GeminiCli,
                ThinkingConfig::budget(512),
                budget_model("gemini-2.5-flash", 0, 24576),
            ),
        );
        assert_eq!(
            out["request"]["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            json!(512)
        );
    }

    #[test]
    fn antigravity_claude_cap_reduces_budget() {
        let body = json!({"request": {"generationConfig": {"maxOutputTokens": 8192}}});
        let out = apply_antigravity(
            body,
            &applied(
                Dialect::Antigravity,
                ThinkingConfig::budget(16384),
                budget_model("claude-sonnet-4-5", 1024, 128000),
            ),
        );
        assert_eq!(
            out["request"]["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            json!(8191)
        );
    }

    #[test]
    fn antigravity_claude_cap_below_min_drops_config() {
        let body = json!({"request": {"generationConfig": {"maxOutputTokens": 512}}});
        let out = apply_antigravity(
            body,
            &applied(
                Dialect::Antigravity,
                ThinkingConfig::budget(16384),
                budget_model("claude-sonnet-4-5", 1024, 128000),
            ),
        );
        assert!(
            out["request"]["generationConfig"]
                .get("thinkingConfig")
                .is_none()
        );
    }
}

use serde_json::Value;

use xproxy_common::{Dialect, ThinkingError, ThinkingErrorCode};
use xproxy_json::{delete_path, get_bool, get_i64, get_path, get_str};
use xproxy_model::ThinkingLevel;

use crate::types::ThinkingConfig;

const GEMINI_CONTAINERS: [&str; 2] = [
    "generationConfig.thinkingConfig",
    "generation_config.thinking_config",
];

/// Read the thinking configuration a request body expresses in the given
/// dialect. `Ok(None)` means the body asks for nothing; an unknown effort
/// level is a caller error rather than something to guess at.
pub fn extract_thinking(
    body: &Value,
    dialect: Dialect,
) -> Result<Option<ThinkingConfig>, ThinkingError> {
    match dialect {
        Dialect::Claude => extract_claude(body),
        Dialect::Gemini => extract_gemini(body, ""),
        Dialect::GeminiCli | Dialect::Antigravity => extract_gemini(body, "request."),
        Dialect::OpenAI | Dialect::Kimi => extract_effort(body, "reasoning_effort"),
        Dialect::OpenAIResponse | Dialect::Codex => extract_effort(body, "reasoning.effort"),
        Dialect::IFlow => extract_iflow(body),
    }
}

fn extract_claude(body: &Value) -> Result<Option<ThinkingConfig>, ThinkingError> {
    let Some(kind) = get_str(body, "thinking.type") else {
        return Ok(None);
    };
    match kind {
        "disabled" => Ok(Some(ThinkingConfig::none())),
        // Adaptive asks the model to spend as much as it needs; normalize to
        // the top effort level up front. Same-dialect passthrough never
        // reaches this code, so the original `adaptive` object survives there.
        "adaptive" => Ok(Some(ThinkingConfig::level(ThinkingLevel::XHigh))),
        "enabled" => match get_i64(body, "thinking.budget_tokens") {
            Some(budget) => Ok(Some(ThinkingConfig::budget(budget))),
            None => Ok(Some(ThinkingConfig::auto())),
        },
        _ => Ok(None),
    }
}

fn extract_gemini(body: &Value, prefix: &str) -> Result<Option<ThinkingConfig>, ThinkingError> {
    for container in GEMINI_CONTAINERS {
        let base = format!("{prefix}{container}");
        for leaf in ["thinkingLevel", "thinking_level"] {
            if let Some(raw) = get_str(body, &format!("{base}.{leaf}")) {
                return level_value(raw).map(Some);
            }
        }
        for leaf in ["thinkingBudget", "thinking_budget"] {
            if let Some(budget) = get_i64(body, &format!("{base}.{leaf}")) {
                return Ok(Some(budget_value(budget)));
            }
        }
    }
    Ok(None)
}

fn extract_effort(body: &Value, path: &str) -> Result<Option<ThinkingConfig>, ThinkingError> {
    match get_str(body, path) {
        Some(raw) => level_value(raw).map(Some),
        None => Ok(None),
    }
}

fn extract_iflow(body: &Value) -> Result<Option<ThinkingConfig>, ThinkingError> {
    let toggle = get_bool(body, "chat_template_kwargs.enable_thinking")
        .or_else(|| get_bool(body, "reasoning_split"));
    match toggle {
        Some(true) => Ok(Some(ThinkingConfig::budget(1))),
        Some(false) => Ok(Some(ThinkingConfig::none())),
        None => extract_effort(body, "reasoning_effort"),
    }
}

fn level_value(raw: &str) -> Result<ThinkingConfig, ThinkingError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" => Ok(ThinkingConfig::none()),
        "auto" => Ok(ThinkingConfig::auto()),
        other => match ThinkingLevel::parse(other) {
            Some(level) => Ok(ThinkingConfig::level(level)),
            None => Err(ThinkingError::new(
                ThinkingErrorCode::UnknownLevel,
                format!("unknown reasoning level {raw:?}"),
            )),
        },
    }
}

fn budget_value(budget: i64) -> ThinkingConfig {
    match budget {
        0 => ThinkingConfig::none(),
        n if n > 0 => ThinkingConfig::budget(n),
        // -1 is the documented dynamic sentinel; anything lower is treated
        // the same rather than rejected.
        _ => ThinkingConfig::auto(),
    }
}

/// Whether the body carries any thinking-shaped field for the dialect.
pub fn has_thinking_config(body: &Value, dialect: Dialect) -> bool {
    thinking_paths(dialect)
        .iter()
        .any(|path| get_path(body, path).is_some())
}

/// Delete every thinking field the dialect knows. Used when the target model
/// cannot think at all, so the upstream never sees a field it would reject.
/// Stripping twice is the same as stripping once.
pub fn strip_thinking_config(body: &mut Value, dialect: Dialect) {
    for path in thinking_paths(dialect) {
        delete_path(body, &path);
    }
    for parent in parent_cleanup_paths(dialect) {
        if get_path(body, parent)
            .and_then(Value::as_object)
            .is_some_and(|map| map.is_empty())
        {
            delete_path(body, parent);
        }
    }
}

fn thinking_paths(dialect: Dialect) -> Vec<String> {
    match dialect {
        Dialect::Claude => vec!["thinking".to_string()],
        Dialect::Gemini => GEMINI_CONTAINERS.iter().map(|c| c.to_string()).collect(),
        Dialect::GeminiCli | Dialect::Antigravity => GEMINI_CONTAINERS
            .iter()
            .map(|c| format!("request.{c}"))
            .collect(),
        Dialect::OpenAI | Dialect::Kimi => vec!["reasoning_effort".to_string()],
        Dialect::OpenAIResponse | Dialect::Codex => vec!["reasoning.effort".to_string()],
        Dialect::IFlow => vec![
            "chat_template_kwargs.enable_thinking".to_string(),
            "chat_template_kwargs.clear_thinking".to_string(),
            "reasoning_split".to_string(),
            "reasoning_effort".to_string(),
        ],
    }
}

fn parent_cleanup_paths(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::OpenAIResponse | Dialect::Codex => &["reasoning"],
        Dialect::IFlow => &["chat_template_kwargs"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThinkingMode;
    use serde_json::json;

    #[test]
    fn claude_variants() {
        let disabled = json!({"thinking": {"type": "disabled"}});
        assert_eq!(
            extract_thinking(&disabled, Dialect::Claude).unwrap(),
            Some(ThinkingConfig::none())
        );

        let enabled = json!({"thinking": {"type": "enabled", "budget_tokens": 2048}});
        assert_eq!(
            extract_thinking(&enabled, Dialect::Claude).unwrap(),
            Some(ThinkingConfig::budget(2048))
        );

        let auto = json!({"thinking": {"type": "enabled"}});
        assert_eq!(
            extract_thinking(&auto, Dialect::Claude).unwrap(),
            Some(ThinkingConfig::auto())
        );

        let adaptive = json!({"thinking": {"type": "adaptive"}});
        assert_eq!(
            extract_thinking(&adaptive, Dialect::Claude).unwrap(),
            Some(ThinkingConfig::level(ThinkingLevel::XHigh))
        );
    }

    #[test]
    fn gemini_level_wins_over_budget() {
        let body = json!({"generationConfig": {"thinkingConfig": {
            "thinkingLevel": "high", "thinkingBudget": 42
        }}});
        assert_eq!(
            extract_thinking(&body, Dialect::Gemini).unwrap(),
            Some(ThinkingConfig::level(ThinkingLevel::High))
        );
    }

    #[test]
    fn gemini_snake_case_and_sentinels() {
        let body = json!({"generation_config": {"thinking_config": {"thinking_budget": -1}}});
        assert_eq!(
            extract_thinking(&body, Dialect::Gemini).unwrap(),
            Some(ThinkingConfig::auto())
        );
        let zero = json!({"generationConfig": {"thinkingConfig": {"thinkingBudget": 0}}});
        assert_eq!(
            extract_thinking(&zero, Dialect::Gemini).unwrap(),
            Some(ThinkingConfig::none())
        );
    }

    #[test]
    fn gemini_cli_uses_request_prefix() {
        let body = json!({"request": {"generationConfig": {"thinkingConfig": {"thinkingBudget": 512}}}});
        assert_eq!(
            extract_thinking(&body, Dialect::GeminiCli).unwrap(),
            Some(ThinkingConfig::budget(512))
        );
        assert_eq!(extract_thinking(&body, Dialect::Gemini).unwrap(), None);
    }

    #[test]
    fn effort_variants() {
        let openai = json!({"reasoning_effort": "none"});
        assert_eq!(
            extract_thinking(&openai, Dialect::OpenAI).unwrap(),
            Some(ThinkingConfig::none())
        );
        let codex = json!({"reasoning": {"effort": "xhigh"}});
        assert_eq!(
            extract_thinking(&codex, Dialect::Codex).unwrap(),
            Some(ThinkingConfig::level(ThinkingLevel::XHigh))
        );
        let bad = json!({"reasoning_effort": "galactic"});
        let err = extract_thinking(&bad, Dialect::OpenAI).unwrap_err();
        assert_eq!(err.code, ThinkingErrorCode::UnknownLevel);
    }

    #[test]
    fn iflow_toggles_and_fallback() {
        let glm = json!({"chat_template_kwargs": {"enable_thinking": true}});
        let config = extract_thinking(&glm, Dialect::IFlow).unwrap().unwrap();
        assert_eq!(config.mode, ThinkingMode::Budget);

        let minimax = json!({"reasoning_split": false});
        assert_eq!(
            extract_thinking(&minimax, Dialect::IFlow).unwrap(),
            Some(ThinkingConfig::none())
        );

        let fallback = json!({"reasoning_effort": "low"});
        assert_eq!(
            extract_thinking(&fallback, Dialect::IFlow).unwrap(),
            Some(ThinkingConfig::level(ThinkingLevel::Low))
        );
    }

    #[test]
    fn strip_is_a_projection() {
        let mut body = json!({
            "model": "m",
            "generationConfig": {"temperature": 0.5, "thinkingConfig": {"thinkingBudget": 8}},
            "generation_config": {"thinking_config": {"thinking_level": "low"}}
        });
        strip_thinking_config(&mut body, Dialect::Gemini);
        let once = body.clone();
        strip_thinking_config(&mut body, Dialect::Gemini);
        assert_eq!(body, once);
        assert!(get_path(&body, "generationConfig.thinkingConfig").is_none());
        assert_eq!(get_path(&body, "generationConfig.temperature"), Some(&json!(0.5)));
    }

    #[test]
    fn strip_cleans_empty_reasoning_parent() {
        let mut body = json!({"reasoning": {"effort": "high"}, "model": "m"});
        strip_thinking_config(&mut body, Dialect::Codex);
        assert!(get_path(&body, "reasoning").is_none());

        let mut keeps = json!({"reasoning": {"effort": "high", "summary": "auto"}});
        strip_thinking_config(&mut keeps, Dialect::Codex);
        assert_eq!(get_str(&keeps, "reasoning.summary"), Some("auto"));
    }
}

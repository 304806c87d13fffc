use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use xproxy_common::{Dialect, ThinkingError};
use xproxy_json::{get_path, set_path};
use xproxy_model::{ModelInfo, ModelRegistry, registry};

use crate::apply::{Applied, ApplierRegistry, appliers};
use crate::extract::{extract_thinking, has_thinking_config, strip_thinking_config};
use crate::suffix::{classify_suffix, parse_suffix};
use crate::validate::validate;

/// A validation failure that still hands the caller the original body, so
/// defensive callers can forward something intelligible instead of nothing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct ThinkingRejection {
    pub body: Value,
    pub error: ThinkingError,
}

impl ThinkingRejection {
    pub fn into_body(self) -> Value {
        self.body
    }
}

/// Apply the thinking pipeline using the process-wide model and applier
/// registries.
pub fn apply_thinking(
    body: Value,
    model: &str,
    from: Dialect,
    to: Dialect,
    provider_key: &str,
) -> Result<Value, ThinkingRejection> {
    apply_thinking_with(registry(), appliers(), body, model, from, to, provider_key)
}

/// Reconcile the thinking intent carried by the model suffix or the request
/// body with the model's capabilities, and serialize the outcome into the
/// upstream body. The body is expected in the `to` dialect already; request
/// translation runs first.
#[allow(clippy::too_many_arguments)]
pub fn apply_thinking_with(
    models: &ModelRegistry,
    applier_table: &ApplierRegistry,
    body: Value,
    model: &str,
    from: Dialect,
    to: Dialect,
    provider_key: &str,
) -> Result<Value, ThinkingRejection> {
    let Some(applier) = applier_table.get(to) else {
        debug!(to = to.as_key(), "no thinking applier; passing through");
        return Ok(body);
    };

    let parsed = parse_suffix(model);
    let mut body = body;
    if parsed.has_suffix && get_path(&body, "model").is_some() {
        set_path(&mut body, "model", json!(parsed.model_name));
    }

    let record = models.lookup(&parsed.model_name, provider_key);
    let known = record.as_ref().is_some_and(|info| !info.user_defined);

    if !known {
        // Unknown capabilities: emit whatever was asked for and let the
        // upstream validate.
        let candidate = if parsed.has_suffix {
            classify_suffix(&parsed.raw_suffix)
        } else {
            extract_thinking(&body, to).unwrap_or(None)
        };
        let Some(config) = candidate else {
            return Ok(body);
        };
        let info = record.unwrap_or_else(|| {
            Arc::new(ModelInfo::user_defined(
                parsed.model_name.clone(),
                provider_key,
            ))
        });
        debug!(
            model = %parsed.model_name,
            provider = provider_key,
            "applying thinking permissively for unregistered model"
        );
        let applied = Applied {
            target: to,
            config,
            carry_level: None,
            model: info,
            permissive: true,
        };
        return Ok(applier(body, &applied));
    }

    let record = record.expect("known model");
    if record.thinking.is_none() {
        if has_thinking_config(&body, to) {
            debug!(
                model = %parsed.model_name,
                "model cannot think; stripping thinking config"
            );
            strip_thinking_config(&mut body, to);
        }
        return Ok(body);
    }

    // Suffix intent wins over whatever the body says.
    let candidate = if parsed.has_suffix {
        classify_suffix(&parsed.raw_suffix)
    } else {
        match extract_thinking(&body, to) {
            Ok(candidate) => candidate,
            Err(error) => {
                warn!(model = %parsed.model_name, %error, "thinking extraction failed");
                return Err(ThinkingRejection { body, error });
            }
        }
    };
    let Some(config) = candidate else {
        return Ok(body);
    };

    match validate(config, &record, from, to, parsed.has_suffix) {
        Ok(resolved) => {
            let applied = Applied {
                target: to,
                config: resolved.config,
                carry_level: resolved.carry_level,
                model: record,
                permissive: false,
            };
            Ok(applier(body, &applied))
        }
        Err(error) => {
            warn!(model = %parsed.model_name, %error, "thinking validation failed");
            Err(ThinkingRejection { body, error })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xproxy_common::ThinkingErrorCode;
    use xproxy_model::{ThinkingLevel, ThinkingSupport};

    fn test_registry() -> ModelRegistry {
        let models = ModelRegistry::new();
        models.register(ModelInfo {
            id: "plain-model".to_string(),
            provider: "openai".to_string(),
            user_defined: false,
            max_completion_tokens: None,
            thinking: None,
        });
        models.register(ModelInfo {
            id: "level-model".to_string(),
            provider: "codex".to_string(),
            user_defined: false,
            max_completion_tokens: None,
            thinking: Some(ThinkingSupport {
                min_budget: 0,
                max_budget: 0,
                levels: vec![
                    ThinkingLevel::Minimal,
                    ThinkingLevel::Low,
                    ThinkingLevel::Medium,
                    ThinkingLevel::High,
                ],
                zero_allowed: false,
                dynamic_allowed: false,
            }),
        });
        models.register(ModelInfo {
            id: "claude-budget-model".to_string(),
            provider: "claude".to_string(),
            user_defined: false,
            max_completion_tokens: Some(200000),
            thinking: Some(ThinkingSupport {
                min_budget: 1024,
                max_budget: 128000,
                levels: Vec::new(),
                zero_allowed: true,
                dynamic_allowed: false,
            }),
        });
        models
    }

    fn run(
        models: &ModelRegistry,
        body: Value,
        model: &str,
        from: Dialect,
        to: Dialect,
        provider: &str,
    ) -> Result<Value, ThinkingRejection> {
        apply_thinking_with(models, appliers(), body, model, from, to, provider)
    }

    #[test]
    fn passthrough_when_no_config_anywhere() {
        let models = test_registry();
        let body = json!({"model": "claude-budget-model", "max_tokens": 1024});
        let out = run(
            &models,
            body.clone(),
            "claude-budget-model",
            Dialect::OpenAI,
            Dialect::Claude,
            "claude",
        )
        .unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn suffix_beats_body_config() {
        let models = test_registry();
        let body = json!({"model": "x", "thinking": {"type": "enabled", "budget_tokens": 2048}});
        let out = run(
            &models,
            body,
            "claude-budget-model(8192)",
            Dialect::Claude,
            Dialect::Claude,
            "claude",
        )
        .unwrap();
        assert_eq!(out["thinking"]["budget_tokens"], json!(8192));
        assert_eq!(out["model"], json!("claude-budget-model"));
    }

    #[test]
    fn unknown_model_applies_permissively() {
        let models = test_registry();
        let out = run(
            &models,
            json!({"model": "mystery"}),
            "mystery(4096)",
            Dialect::OpenAI,
            Dialect::Claude,
            "claude",
        )
        .unwrap();
        assert_eq!(out["thinking"]["budget_tokens"], json!(4096));
    }

    #[test]
    fn no_thinking_model_gets_stripped() {
        let models = test_registry();
        let body = json!({"model": "plain-model", "reasoning_effort": "high"});
        let out = run(
            &models,
            body,
            "plain-model",
            Dialect::Claude,
            Dialect::OpenAI,
            "openai",
        )
        .unwrap();
        assert!(out.get("reasoning_effort").is_none());
    }

    #[test]
    fn validation_failure_returns_original_body() {
        let models = test_registry();
        let body = json!({"model": "level-model", "reasoning": {"effort": "xhigh"}});
        let err = run(
            &models,
            body.clone(),
            "level-model",
            Dialect::OpenAI,
            Dialect::Codex,
            "codex",
        )
        .unwrap_err();
        assert_eq!(err.error.code, ThinkingErrorCode::LevelNotSupported);
        assert_eq!(err.body, body);
    }

    #[test]
    fn auto_without_dynamic_becomes_midpoint_budget() {
        let models = test_registry();
        let body = json!({"model": "claude-budget-model", "max_tokens": 100000});
        let out = run(
            &models,
            body,
            "claude-budget-model(auto)",
            Dialect::OpenAI,
            Dialect::Claude,
            "claude",
        )
        .unwrap();
        assert_eq!(out["thinking"]["budget_tokens"], json!(64512));
    }
}

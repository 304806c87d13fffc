use serde_json::{Value, json};

use xproxy_common::{Dialect, ThinkingErrorCode};
use xproxy_model::{ModelInfo, ModelRegistry, ThinkingLevel, ThinkingSupport};
use xproxy_thinking::{appliers, apply_thinking_with};

fn registry() -> ModelRegistry {
    let models = ModelRegistry::new();
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
        id: "level-subset-model".to_string(),
        provider: "gemini".to_string(),
        user_defined: false,
        max_completion_tokens: None,
        thinking: Some(ThinkingSupport {
            min_budget: 0,
            max_budget: 0,
            levels: vec![ThinkingLevel::Low, ThinkingLevel::High],
            zero_allowed: false,
            dynamic_allowed: true,
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
    models.register(ModelInfo {
        id: "gravity-model".to_string(),
        provider: "antigravity".to_string(),
        user_defined: false,
        max_completion_tokens: Some(65536),
        thinking: Some(ThinkingSupport {
            min_budget: 128,
            max_budget: 20000,
            levels: Vec::new(),
            zero_allowed: true,
            dynamic_allowed: true,
        }),
    });
    models.register(ModelInfo {
        id: "no-think-model".to_string(),
        provider: "openai".to_string(),
        user_defined: false,
        max_completion_tokens: None,
        thinking: None,
    });
    models
}

fn apply(
    models: &ModelRegistry,
    body: Value,
    model: &str,
    from: Dialect,
    to: Dialect,
    provider: &str,
) -> Result<Value, xproxy_thinking::ThinkingRejection> {
    apply_thinking_with(models, appliers(), body, model, from, to, provider)
}

// Case A: an unsupported level from a level-based dialect fails; the same
// level arriving from a budget-based dialect clamps.
#[test]
fn suffix_level_on_level_only_model() {
    let models = registry();
    let err = apply(
        &models,
        json!({"model": "level-model"}),
        "level-model(xhigh)",
        Dialect::OpenAI,
        Dialect::Codex,
        "codex",
    )
    .unwrap_err();
    assert_eq!(err.error.code, ThinkingErrorCode::LevelNotSupported);

    let out = apply(
        &models,
        json!({"model": "level-model"}),
        "level-model(xhigh)",
        Dialect::Gemini,
        Dialect::Codex,
        "codex",
    )
    .unwrap();
    assert_eq!(out["reasoning"]["effort"], json!("high"));
}

// Case B: a tiny budget on a level-only model becomes the nearest supported
// level with thoughts included.
#[test]
fn budget_to_level_conversion() {
    let models = registry();
    let body = json!({
        "model": "level-subset-model",
        "generationConfig": {"thinkingConfig": {"thinkingBudget": 1}}
    });
    let out = apply(
        &models,
        body,
        "level-subset-model",
        Dialect::Claude,
        Dialect::Gemini,
        "gemini",
    )
    .unwrap();
    assert_eq!(
        out["generationConfig"]["thinkingConfig"],
        json!({"thinkingLevel": "low", "includeThoughts": true})
    );
}

// Case C: auto on a model without dynamic thinking takes the midpoint budget.
#[test]
fn auto_without_dynamic_midpoint() {
    let models = registry();
    let body = json!({
        "model": "claude-budget-model",
        "max_tokens": 100000,
        "thinking": {"type": "enabled"}
    });
    let out = apply(
        &models,
        body,
        "claude-budget-model",
        Dialect::OpenAI,
        Dialect::Claude,
        "claude",
    )
    .unwrap();
    assert_eq!(out["thinking"]["budget_tokens"], json!(64512));
}

// Case D: same-family body budgets are strict, suffix budgets clamp.
#[test]
fn gemini_family_strictness() {
    let models = registry();
    let body = json!({
        "model": "gravity-model",
        "request": {"generationConfig": {"thinkingConfig": {"thinkingBudget": 64000}}}
    });
    let err = apply(
        &models,
        body.clone(),
        "gravity-model",
        Dialect::Gemini,
        Dialect::Antigravity,
        "antigravity",
    )
    .unwrap_err();
    assert_eq!(err.error.code, ThinkingErrorCode::BudgetOutOfRange);
    assert_eq!(err.body, body);

    let out = apply(
        &models,
        json!({"model": "gravity-model", "request": {}}),
        "gravity-model(64000)",
        Dialect::Gemini,
        Dialect::Antigravity,
        "antigravity",
    )
    .unwrap();
    let config = &out["request"]["generationConfig"]["thinkingConfig"];
    assert_eq!(config["thinkingBudget"], json!(20000));
    assert_eq!(config["includeThoughts"], json!(true));
}

// Case E: models without thinking support get their thinking fields removed
// and everything else passes through untouched.
#[test]
fn no_support_strips_fields() {
    let models = registry();
    let body = json!({"model": "no-think-model", "reasoning_effort": "high", "temperature": 0.3});
    let out = apply(
        &models,
        body,
        "no-think-model",
        Dialect::OpenAI,
        Dialect::OpenAI,
        "openai",
    )
    .unwrap();
    assert!(out.get("reasoning_effort").is_none());
    assert_eq!(out["temperature"], json!(0.3));

    let plain = json!({"model": "no-think-model", "messages": []});
    let out = apply(
        &models,
        plain.clone(),
        "no-think-model",
        Dialect::OpenAI,
        Dialect::OpenAI,
        "openai",
    )
    .unwrap();
    assert_eq!(out, plain);
}

#[test]
fn suffix_none_disables_on_claude() {
    let models = registry();
    let body = json!({"model": "x", "max_tokens": 2000});
    let out = apply(
        &models,
        body,
        "claude-budget-model(none)",
        Dialect::Claude,
        Dialect::Claude,
        "claude",
    )
    .unwrap();
    assert_eq!(out["thinking"], json!({"type": "disabled"}));
    assert_eq!(out["model"], json!("claude-budget-model"));
}

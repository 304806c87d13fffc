use xproxy_common::{Dialect, Family, ThinkingError, ThinkingErrorCode};
use xproxy_model::{ModelInfo, ThinkingLevel};

use crate::types::{Resolved, ThinkingConfig, ThinkingMode, budget_for_level, level_for_budget};

/// Normalize a candidate configuration against a model's capabilities.
///
/// The rules run in a fixed order: capability gate, cross-format conversion,
/// mode collapse, level-support check, budget range, dynamic fallback, final
/// clamping. Validating an already-validated config is a no-op.
///
/// Suffix-sourced and cross-family inputs clamp where same-family body inputs
/// fail hard; the caller says which case it is via `from_suffix`.
pub fn validate(
    config: ThinkingConfig,
    model: &ModelInfo,
    from: Dialect,
    to: Dialect,
    from_suffix: bool,
) -> Result<Resolved, ThinkingError> {
    let Some(support) = &model.thinking else {
        if config.mode == ThinkingMode::None {
            return Ok(Resolved::plain(config));
        }
        return Err(ThinkingError::new(
            ThinkingErrorCode::ThinkingNotSupported,
            format!("model {:?} does not support thinking", model.id),
        )
        .with_model(model.id.clone()));
    };

    let mut config = config;

    // Cross-format conversion: levels on budget-only models become budgets,
    // budgets on level-only models become the nearest supported level.
    if config.mode == ThinkingMode::Level
        && support.is_budget_only()
        && let Some(level) = config.level
    {
        config = ThinkingConfig::budget(budget_for_level(level, support.max_budget));
    }
    if config.mode == ThinkingMode::Budget && support.is_level_only() && config.budget != 0 {
        let canonical = level_for_budget(config.budget);
        let level = canonical.nearest_in(&support.levels).unwrap_or(canonical);
        config = ThinkingConfig::level(level);
    }

    // Mode collapse.
    if config.mode == ThinkingMode::Budget && config.budget == 0 {
        config = ThinkingConfig::none();
    }

    // Level support.
    if config.mode == ThinkingMode::Level
        && let Some(level) = config.level
        && !support.supports_level(level)
    {
        let clamped = (from.budget_based() && !to.budget_based())
            .then(|| level.nearest_in(&support.levels))
            .flatten();
        match clamped {
            Some(level) => config = ThinkingConfig::level(level),
            None => {
                let valid: Vec<&str> = support.levels.iter().map(ThinkingLevel::as_str).collect();
                return Err(ThinkingError::new(
                    ThinkingErrorCode::LevelNotSupported,
                    format!(
                        "level {:?} not supported by {:?}; valid levels: {}",
                        level.as_str(),
                        model.id,
                        valid.join(", ")
                    ),
                )
                .with_model(model.id.clone()));
            }
        }
    }

    // Budget range: same-family body input is strict, everything else clamps.
    if config.mode == ThinkingMode::Budget && support.has_budget_range() {
        let strict = !from_suffix && from.family() == to.family();
        if config.budget < support.min_budget || config.budget > support.max_budget {
            if strict {
                return Err(ThinkingError::new(
                    ThinkingErrorCode::BudgetOutOfRange,
                    format!(
                        "budget {} outside [{}, {}] for {:?}",
                        config.budget, support.min_budget, support.max_budget, model.id
                    ),
                )
                .with_model(model.id.clone()));
            }
            config =
                ThinkingConfig::budget(config.budget.clamp(support.min_budget, support.max_budget));
        }
    }

    // Auto on a model without dynamic thinking gets a concrete middle ground.
    if config.mode == ThinkingMode::Auto && !support.dynamic_allowed {
        if support.is_level_only() {
            let level = ThinkingLevel::Medium
                .nearest_in(&support.levels)
                .unwrap_or(ThinkingLevel::Medium);
            config = ThinkingConfig::level(level);
        } else if support.has_budget_range() {
            let midpoint = (support.min_budget + support.max_budget) / 2;
            if midpoint <= 0 && support.zero_allowed {
                config = ThinkingConfig::none();
            } else {
                config = ThinkingConfig::budget(midpoint);
            }
        }
    }

    // Final clamping. A -1 budget (dynamic) passes through; a zero budget
    // survives only where the model allows it. Claude keeps zero regardless,
    // that is how an explicit disable is written on the wire.
    if config.mode == ThinkingMode::None
        && to.family() != Family::Claude
        && support.has_budget_range()
        && !support.zero_allowed
    {
        config.budget = support.min_budget;
    }

    let carry_level = (config.mode == ThinkingMode::None
        && config.budget > 0
        && support.has_levels())
    .then(|| support.lowest_level())
    .flatten();

    Ok(Resolved {
        config,
        carry_level,
    })
}

use xproxy_model::ThinkingLevel;

/// Which shape of thinking request the configuration expresses. The mode
/// selects whether `budget` or `level` is the meaningful field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingMode {
    /// Thinking explicitly disabled.
    None,
    /// Dynamic thinking: the upstream picks the budget itself.
    Auto,
    /// A numeric token budget.
    Budget,
    /// A discrete effort level.
    Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingConfig {
    pub mode: ThinkingMode,
    pub budget: i64,
    pub level: Option<ThinkingLevel>,
}

impl ThinkingConfig {
    pub fn none() -> Self {
        Self {
            mode: ThinkingMode::None,
            budget: 0,
            level: None,
        }
    }

    pub fn auto() -> Self {
        Self {
            mode: ThinkingMode::Auto,
            budget: -1,
            level: None,
        }
    }

    pub fn budget(tokens: i64) -> Self {
        Self {
            mode: ThinkingMode::Budget,
            budget: tokens,
            level: None,
        }
    }

    pub fn level(level: ThinkingLevel) -> Self {
        Self {
            mode: ThinkingMode::Level,
            budget: 0,
            level: Some(level),
        }
    }
}

/// Result of splitting a `name(value)` model string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixParse {
    pub model_name: String,
    pub has_suffix: bool,
    pub raw_suffix: String,
}

/// A validated configuration ready for a provider applier. `carry_level` is
/// set when thinking ended up disabled but the target model is
/// level-capable and clamping left a positive budget: the applier then emits
/// `includeThoughts=false` alongside a valid level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub config: ThinkingConfig,
    pub carry_level: Option<ThinkingLevel>,
}

impl Resolved {
    pub fn plain(config: ThinkingConfig) -> Self {
        Self {
            config,
            carry_level: None,
        }
    }
}

const MINIMAL_BUDGET: i64 = 128;
const LOW_BUDGET: i64 = 1024;
const MEDIUM_BUDGET: i64 = 8192;
const HIGH_BUDGET: i64 = 24576;
const FALLBACK_XHIGH_BUDGET: i64 = 32768;

/// Canonical budget for a level. The only place level names acquire numeric
/// meaning; `level_for_budget` is the inverse over the same thresholds.
/// `xhigh` means "everything the model has", so it resolves to `max_cap`
/// when one is known.
pub fn budget_for_level(level: ThinkingLevel, max_cap: i64) -> i64 {
    match level {
        ThinkingLevel::Minimal => MINIMAL_BUDGET,
        ThinkingLevel::Low => LOW_BUDGET,
        ThinkingLevel::Medium => MEDIUM_BUDGET,
        ThinkingLevel::High => HIGH_BUDGET,
        ThinkingLevel::XHigh => {
            if max_cap > 0 {
                max_cap
            } else {
                FALLBACK_XHIGH_BUDGET
            }
        }
    }
}

pub fn level_for_budget(budget: i64) -> ThinkingLevel {
    if budget <= MINIMAL_BUDGET {
        ThinkingLevel::Minimal
    } else if budget <= LOW_BUDGET {
        ThinkingLevel::Low
    } else if budget <= MEDIUM_BUDGET {
        ThinkingLevel::Medium
    } else if budget <= HIGH_BUDGET {
        ThinkingLevel::High
    } else {
        ThinkingLevel::XHigh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_invert() {
        for level in [
            ThinkingLevel::Minimal,
            ThinkingLevel::Low,
            ThinkingLevel::Medium,
            ThinkingLevel::High,
        ] {
            assert_eq!(level_for_budget(budget_for_level(level, 0)), level);
        }
        assert_eq!(level_for_budget(budget_for_level(ThinkingLevel::XHigh, 128000)), ThinkingLevel::XHigh);
    }

    #[test]
    fn xhigh_uses_model_cap() {
        assert_eq!(budget_for_level(ThinkingLevel::XHigh, 100000), 100000);
        assert_eq!(budget_for_level(ThinkingLevel::XHigh, 0), FALLBACK_XHIGH_BUDGET);
    }
}

use serde::{Deserialize, Serialize};

use crate::level::ThinkingLevel;

/// What a model can do with thinking. `levels` is an ordered subset of the
/// five effort levels; a zero `max_budget` means the model has no numeric
/// budget range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingSupport {
    #[serde(default)]
    pub min_budget: i64,
    #[serde(default)]
    pub max_budget: i64,
    #[serde(default)]
    pub levels: Vec<ThinkingLevel>,
    #[serde(default)]
    pub zero_allowed: bool,
    #[serde(default)]
    pub dynamic_allowed: bool,
}

impl ThinkingSupport {
    pub fn has_levels(&self) -> bool {
        !self.levels.is_empty()
    }

    pub fn has_budget_range(&self) -> bool {
        self.max_budget > 0
    }

    pub fn is_budget_only(&self) -> bool {
        self.has_budget_range() && !self.has_levels()
    }

    pub fn is_level_only(&self) -> bool {
        self.has_levels() && !self.has_budget_range()
    }

    pub fn is_hybrid(&self) -> bool {
        self.has_levels() && self.has_budget_range()
    }

    pub fn supports_level(&self, level: ThinkingLevel) -> bool {
        self.levels.contains(&level)
    }

    pub fn lowest_level(&self) -> Option<ThinkingLevel> {
        self.levels.iter().copied().min_by_key(ThinkingLevel::index)
    }

    pub fn highest_level(&self) -> Option<ThinkingLevel> {
        self.levels.iter().copied().max_by_key(ThinkingLevel::index)
    }
}

/// Capability record for one model under one provider. Registered once at
/// startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    /// Capabilities are unknown; validation is skipped and the upstream
    /// decides.
    #[serde(default)]
    pub user_defined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingSupport>,
}

impl ModelInfo {
    pub fn user_defined(id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            user_defined: true,
            max_completion_tokens: None,
            thinking: None,
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::info::{ModelInfo, ThinkingSupport};
use crate::level::ThinkingLevel;

/// Startup configuration entry for one model of a provider's table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_defined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingSupportConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingSupportConfig {
    #[serde(default)]
    pub min_budget: i64,
    #[serde(default)]
    pub max_budget: i64,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub zero_allowed: bool,
    #[serde(default)]
    pub dynamic_allowed: bool,
}

impl ModelConfig {
    pub fn to_info(&self, provider: &str) -> ModelInfo {
        ModelInfo {
            id: self.id.clone(),
            provider: provider.to_string(),
            user_defined: self.user_defined,
            max_completion_tokens: self.max_completion_tokens,
            thinking: self.thinking.as_ref().map(ThinkingSupportConfig::to_support),
        }
    }
}

impl ThinkingSupportConfig {
    pub fn to_support(&self) -> ThinkingSupport {
        // Unknown level names in config are dropped rather than rejected;
        // the validator treats the remaining set as authoritative.
        let levels = self
            .levels
            .iter()
            .filter_map(|name| ThinkingLevel::parse(name))
            .collect();
        ThinkingSupport {
            min_budget: self.min_budget,
            max_budget: self.max_budget,
            levels,
            zero_allowed: self.zero_allowed,
            dynamic_allowed: self.dynamic_allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trip() {
        let raw = serde_json::json!({
            "id": "thinker",
            "max_completion_tokens": 8192,
            "thinking": {
                "min_budget": 1024,
                "max_budget": 32768,
                "levels": ["low", "HIGH", "bogus"],
                "dynamic_allowed": true
            }
        });
        let config: ModelConfig = serde_json::from_value(raw).unwrap();
        let info = config.to_info("test-provider");
        let support = info.thinking.unwrap();
        assert_eq!(support.levels, vec![ThinkingLevel::Low, ThinkingLevel::High]);
        assert!(support.dynamic_allowed);
        assert!(!support.zero_allowed);
        assert_eq!(info.provider, "test-provider");
    }
}

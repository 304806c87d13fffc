use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::config::ModelConfig;
use crate::info::ModelInfo;

/// `(model id, provider key)` → capability record. The same id may carry
/// different capabilities under different providers. Registration happens
/// during startup; lookups afterwards never contend on the write path.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<(String, String), Arc<ModelInfo>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, info: ModelInfo) {
        let key = (info.id.clone(), info.provider.clone());
        let mut models = self.models.write().expect("model registry poisoned");
        models.insert(key, Arc::new(info));
    }

    pub fn lookup(&self, model_id: &str, provider: &str) -> Option<Arc<ModelInfo>> {
        let models = self.models.read().expect("model registry poisoned");
        models
            .get(&(model_id.to_string(), provider.to_string()))
            .cloned()
    }

    /// Load a provider's model table from configuration.
    pub fn load(&self, provider: &str, configs: &[ModelConfig]) {
        for config in configs {
            self.register(config.to_info(provider));
        }
    }

    pub fn len(&self) -> usize {
        self.models.read().expect("model registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide default registry.
pub fn registry() -> &'static ModelRegistry {
    static REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ModelRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::ThinkingSupport;

    #[test]
    fn same_id_different_providers() {
        let registry = ModelRegistry::new();
        registry.register(ModelInfo {
            id: "shared".to_string(),
            provider: "alpha".to_string(),
            user_defined: false,
            max_completion_tokens: Some(4096),
            thinking: None,
        });
        registry.register(ModelInfo {
            id: "shared".to_string(),
            provider: "beta".to_string(),
            user_defined: false,
            max_completion_tokens: Some(8192),
            thinking: Some(ThinkingSupport {
                min_budget: 1024,
                max_budget: 32768,
                levels: Vec::new(),
                zero_allowed: false,
                dynamic_allowed: true,
            }),
        });

        let alpha = registry.lookup("shared", "alpha").unwrap();
        let beta = registry.lookup("shared", "beta").unwrap();
        assert!(alpha.thinking.is_none());
        assert!(beta.thinking.is_some());
        assert!(registry.lookup("shared", "gamma").is_none());
    }
}

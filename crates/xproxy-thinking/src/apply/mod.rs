mod claude;
mod gemini;
mod iflow;
mod openai;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;

use xproxy_common::{Dialect, ThinkingError, ThinkingErrorCode};
use xproxy_model::{ModelInfo, ThinkingLevel};

use crate::types::ThinkingConfig;

/// A validated configuration plus everything an applier needs to serialize
/// it: the capability record, the carried level for disabled-but-level-capable
/// models, and whether the permissive (unknown-model) path is in effect.
#[derive(Debug, Clone)]
pub struct Applied {
    pub target: Dialect,
    pub config: ThinkingConfig,
    pub carry_level: Option<ThinkingLevel>,
    pub model: Arc<ModelInfo>,
    pub permissive: bool,
}

pub type ApplierFn = fn(Value, &Applied) -> Value;

/// Dialect → applier function table. Populated once before any request is
/// served; lookups afterwards take the read lock only.
#[derive(Default)]
pub struct ApplierRegistry {
    appliers: RwLock<HashMap<Dialect, ApplierFn>>,
}

impl ApplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_defaults();
        registry
    }

    pub fn register(&self, dialect: Dialect, applier: ApplierFn) {
        let mut appliers = self.appliers.write().expect("applier registry poisoned");
        appliers.insert(dialect, applier);
    }

    pub fn get(&self, dialect: Dialect) -> Option<ApplierFn> {
        let appliers = self.appliers.read().expect("applier registry poisoned");
        appliers.get(&dialect).copied()
    }

    /// Run the registered applier. An `Applied` built for a different dialect
    /// is refused rather than silently serialized in the wrong shape.
    pub fn apply(
        &self,
        dialect: Dialect,
        body: Value,
        applied: &Applied,
    ) -> Result<Value, ThinkingError> {
        if applied.target != dialect {
            return Err(ThinkingError::new(
                ThinkingErrorCode::ProviderMismatch,
                format!(
                    "config resolved for {:?} applied to {:?}",
                    applied.target.as_key(),
                    dialect.as_key()
                ),
            ));
        }
        match self.get(dialect) {
            Some(applier) => Ok(applier(body, applied)),
            None => Ok(body),
        }
    }

    fn register_defaults(&self) {
        self.register(Dialect::Claude, claude::apply);
        self.register(Dialect::Gemini, gemini::apply_gemini);
        self.register(Dialect::GeminiCli, gemini::apply_gemini_cli);
        self.register(Dialect::Antigravity, gemini::apply_antigravity);
        self.register(Dialect::OpenAI, openai::apply_openai);
        self.register(Dialect::Kimi, openai::apply_openai);
        self.register(Dialect::OpenAIResponse, openai::apply_codex);
        self.register(Dialect::Codex, openai::apply_codex);
        self.register(Dialect::IFlow, iflow::apply);
    }
}

/// Process-wide applier table with every built-in dialect registered.
pub fn appliers() -> &'static ApplierRegistry {
    static APPLIERS: OnceLock<ApplierRegistry> = OnceLock::new();
    APPLIERS.get_or_init(ApplierRegistry::with_defaults)
}

/// Replace or add the applier for a dialect in the process-wide table.
pub fn register_applier(dialect: Dialect, applier: ApplierFn) {
    appliers().register(dialect, applier);
}

mod apply;
mod extract;
mod pipeline;
mod suffix;
mod types;
mod validate;

pub use apply::{Applied, ApplierFn, ApplierRegistry, appliers, register_applier};
pub use extract::{extract_thinking, has_thinking_config, strip_thinking_config};
pub use pipeline::{ThinkingRejection, apply_thinking, apply_thinking_with};
pub use suffix::{classify_suffix, classify_suffix_strict, parse_suffix};
pub use types::{
    Resolved, SuffixParse, ThinkingConfig, ThinkingMode, budget_for_level, level_for_budget,
};
pub use validate::validate;

pub use xproxy_common::{Dialect, ThinkingError, ThinkingErrorCode};
pub use xproxy_model::{ModelInfo, ThinkingLevel, ThinkingSupport};

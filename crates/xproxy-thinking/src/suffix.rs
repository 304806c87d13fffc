use xproxy_common::{ThinkingError, ThinkingErrorCode};
use xproxy_model::ThinkingLevel;

use crate::types::{SuffixParse, ThinkingConfig};

/// Split a `name(value)` model string. The suffix is the text inside the last
/// balanced parenthesis pair at the very end of the string; anything else
/// leaves the model name untouched. Pure and total.
pub fn parse_suffix(model: &str) -> SuffixParse {
    if !model.ends_with(')') {
        return no_suffix(model);
    }

    let mut depth = 0usize;
    for (position, ch) in model.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    return SuffixParse {
                        model_name: model[..position].to_string(),
                        has_suffix: true,
                        raw_suffix: model[position + 1..model.len() - 1].to_string(),
                    };
                }
            }
            _ => {}
        }
    }

    no_suffix(model)
}

fn no_suffix(model: &str) -> SuffixParse {
    SuffixParse {
        model_name: model.to_string(),
        has_suffix: false,
        raw_suffix: String::new(),
    }
}

/// Classify a suffix value into a thinking configuration. Priority: special
/// values, then level names, then non-negative integers. Unrecognized or
/// overflowing values yield no configuration at all.
pub fn classify_suffix(raw: &str) -> Option<ThinkingConfig> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    match value.to_ascii_lowercase().as_str() {
        "none" => return Some(ThinkingConfig::none()),
        "auto" | "-1" => return Some(ThinkingConfig::auto()),
        _ => {}
    }

    if let Some(level) = ThinkingLevel::parse(value) {
        return Some(ThinkingConfig::level(level));
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        return match value.parse::<i64>() {
            Ok(0) => Some(ThinkingConfig::none()),
            Ok(budget) => Some(ThinkingConfig::budget(budget)),
            Err(_) => None,
        };
    }

    None
}

/// Strict variant for callers that want typos rejected instead of silently
/// dropped. Part of the public error contract; the orchestrator itself stays
/// lenient.
pub fn classify_suffix_strict(raw: &str) -> Result<Option<ThinkingConfig>, ThinkingError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match classify_suffix(value) {
        Some(config) => Ok(Some(config)),
        None => Err(ThinkingError::new(
            ThinkingErrorCode::InvalidSuffix,
            format!("unrecognized thinking suffix {value:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThinkingMode;

    #[test]
    fn no_trailing_paren_means_no_suffix() {
        let parsed = parse_suffix("gemini-2.5-pro");
        assert!(!parsed.has_suffix);
        assert_eq!(parsed.model_name, "gemini-2.5-pro");
    }

    #[test]
    fn simple_suffix() {
        let parsed = parse_suffix("claude-sonnet(8192)");
        assert!(parsed.has_suffix);
        assert_eq!(parsed.model_name, "claude-sonnet");
        assert_eq!(parsed.raw_suffix, "8192");
    }

    #[test]
    fn nested_parens_balance() {
        let parsed = parse_suffix("model(a(b))");
        assert!(parsed.has_suffix);
        assert_eq!(parsed.model_name, "model");
        assert_eq!(parsed.raw_suffix, "a(b)");
    }

    #[test]
    fn unbalanced_is_no_suffix() {
        let parsed = parse_suffix("model)");
        assert!(!parsed.has_suffix);
        assert_eq!(parsed.model_name, "model)");
    }

    #[test]
    fn special_values() {
        assert_eq!(classify_suffix("NONE").unwrap().mode, ThinkingMode::None);
        assert_eq!(classify_suffix("auto").unwrap().mode, ThinkingMode::Auto);
        assert_eq!(classify_suffix("-1").unwrap().mode, ThinkingMode::Auto);
    }

    #[test]
    fn levels_and_numbers() {
        assert_eq!(
            classify_suffix("XHigh").unwrap().level,
            Some(ThinkingLevel::XHigh)
        );
        let budget = classify_suffix("016384").unwrap();
        assert_eq!(budget.mode, ThinkingMode::Budget);
        assert_eq!(budget.budget, 16384);
        assert_eq!(classify_suffix("0").unwrap().mode, ThinkingMode::None);
    }

    #[test]
    fn rejects_garbage_silently() {
        assert_eq!(classify_suffix("-42"), None);
        assert_eq!(classify_suffix("99999999999999999999999999"), None);
        assert_eq!(classify_suffix("banana"), None);
        assert_eq!(classify_suffix(""), None);
    }

    #[test]
    fn strict_variant_errors() {
        let err = classify_suffix_strict("banana").unwrap_err();
        assert_eq!(err.code, ThinkingErrorCode::InvalidSuffix);
        assert!(classify_suffix_strict("high").unwrap().is_some());
    }
}

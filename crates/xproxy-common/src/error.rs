use serde::{Deserialize, Serialize};

/// Validation failure classes raised by the thinking pipeline. Every code is
/// user-visible and maps to HTTP 400 when surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThinkingErrorCode {
    InvalidSuffix,
    UnknownLevel,
    ThinkingNotSupported,
    LevelNotSupported,
    BudgetOutOfRange,
    ProviderMismatch,
}

impl ThinkingErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingErrorCode::InvalidSuffix => "INVALID_SUFFIX",
            ThinkingErrorCode::UnknownLevel => "UNKNOWN_LEVEL",
            ThinkingErrorCode::ThinkingNotSupported => "THINKING_NOT_SUPPORTED",
            ThinkingErrorCode::LevelNotSupported => "LEVEL_NOT_SUPPORTED",
            ThinkingErrorCode::BudgetOutOfRange => "BUDGET_OUT_OF_RANGE",
            ThinkingErrorCode::ProviderMismatch => "PROVIDER_MISMATCH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{}: {message}", code.as_str())]
pub struct ThinkingError {
    pub code: ThinkingErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ThinkingError {
    pub fn new(code: ThinkingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            model: None,
            details: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn http_status(&self) -> u16 {
        400
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code_and_message() {
        let err = ThinkingError::new(ThinkingErrorCode::BudgetOutOfRange, "budget 9 below min 10")
            .with_model("m");
        assert_eq!(err.to_string(), "BUDGET_OUT_OF_RANGE: budget 9 below min 10");
        assert_eq!(err.http_status(), 400);
    }
}

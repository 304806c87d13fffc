use serde_json::Value;
use tokio_util::sync::CancellationToken;

use xproxy_common::Dialect;

/// Everything a response translator may consult while rewriting one
/// response: the dialect pair, the model the client asked for, both request
/// forms, and the request's cancellation token. Translators do no I/O; the
/// token only tells them to stop consuming further chunks.
#[derive(Debug, Clone)]
pub struct TranslateContext {
    /// Dialect the client speaks.
    pub from: Dialect,
    /// Dialect the upstream speaks.
    pub to: Dialect,
    pub model: String,
    pub original_request: Value,
    pub translated_request: Value,
    pub cancel: CancellationToken,
}

impl TranslateContext {
    pub fn new(from: Dialect, to: Dialect, model: impl Into<String>) -> Self {
        Self {
            from,
            to,
            model: model.into(),
            original_request: Value::Null,
            translated_request: Value::Null,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_requests(mut self, original: Value, translated: Value) -> Self {
        self.original_request = original;
        self.translated_request = translated;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

use serde::{Deserialize, Serialize};

/// Request/response schemas the proxy can speak on either side.
///
/// The list is closed: translation and thinking application dispatch over it
/// with exhaustive matches, and registries key on the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "openai-response")]
    OpenAIResponse,
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "gemini-cli")]
    GeminiCli,
    #[serde(rename = "codex")]
    Codex,
    #[serde(rename = "antigravity")]
    Antigravity,
    #[serde(rename = "iflow")]
    IFlow,
    #[serde(rename = "kimi")]
    Kimi,
}

/// Clusters of dialects that share a wire schema and therefore share strict
/// validation semantics in the thinking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    OpenAI,
    Claude,
    Gemini,
}

/// The concrete JSON shape a dialect reads and writes. Several dialects share
/// one schema and differ only in transport details or field prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    OpenAIChat,
    OpenAIResponses,
    Claude,
    Gemini,
}

impl Dialect {
    pub fn as_key(&self) -> &'static str {
        match self {
            Dialect::OpenAI => "openai",
            Dialect::OpenAIResponse => "openai-response",
            Dialect::Claude => "claude",
            Dialect::Gemini => "gemini",
            Dialect::GeminiCli => "gemini-cli",
            Dialect::Codex => "codex",
            Dialect::Antigravity => "antigravity",
            Dialect::IFlow => "iflow",
            Dialect::Kimi => "kimi",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "openai" => Some(Dialect::OpenAI),
            "openai-response" => Some(Dialect::OpenAIResponse),
            "claude" => Some(Dialect::Claude),
            "gemini" => Some(Dialect::Gemini),
            "gemini-cli" => Some(Dialect::GeminiCli),
            "codex" => Some(Dialect::Codex),
            "antigravity" => Some(Dialect::Antigravity),
            "iflow" => Some(Dialect::IFlow),
            "kimi" => Some(Dialect::Kimi),
            _ => None,
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Dialect::Claude => Family::Claude,
            Dialect::Gemini | Dialect::GeminiCli | Dialect::Antigravity => Family::Gemini,
            Dialect::OpenAI
            | Dialect::OpenAIResponse
            | Dialect::Codex
            | Dialect::IFlow
            | Dialect::Kimi => Family::OpenAI,
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            Dialect::Claude => Schema::Claude,
            Dialect::Gemini | Dialect::GeminiCli | Dialect::Antigravity => Schema::Gemini,
            Dialect::OpenAIResponse | Dialect::Codex => Schema::OpenAIResponses,
            Dialect::OpenAI | Dialect::IFlow | Dialect::Kimi => Schema::OpenAIChat,
        }
    }

    /// Dialects that wrap the Gemini body in a `{"request": ...}` envelope.
    pub fn enveloped(&self) -> bool {
        matches!(self, Dialect::GeminiCli | Dialect::Antigravity)
    }

    /// Whether the dialect expresses thinking as a numeric token budget
    /// (as opposed to a discrete effort level or a boolean toggle).
    pub fn budget_based(&self) -> bool {
        matches!(self.family(), Family::Claude | Family::Gemini)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip() {
        for dialect in [
            Dialect::OpenAI,
            Dialect::OpenAIResponse,
            Dialect::Claude,
            Dialect::Gemini,
            Dialect::GeminiCli,
            Dialect::Codex,
            Dialect::Antigravity,
            Dialect::IFlow,
            Dialect::Kimi,
        ] {
            assert_eq!(Dialect::from_key(dialect.as_key()), Some(dialect));
        }
        assert_eq!(Dialect::from_key("grpc"), None);
    }

    #[test]
    fn families() {
        assert_eq!(Dialect::Gemini.family(), Dialect::Antigravity.family());
        assert_eq!(Dialect::OpenAI.family(), Dialect::Codex.family());
        assert_eq!(Dialect::Kimi.family(), Family::OpenAI);
        assert_ne!(Dialect::Claude.family(), Dialect::Gemini.family());
    }

    #[test]
    fn shared_schemas() {
        assert_eq!(Dialect::Codex.schema(), Schema::OpenAIResponses);
        assert_eq!(Dialect::GeminiCli.schema(), Schema::Gemini);
        assert!(Dialect::GeminiCli.enveloped());
        assert!(!Dialect::Gemini.enveloped());
    }
}

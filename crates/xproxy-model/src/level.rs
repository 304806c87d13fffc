use serde::{Deserialize, Serialize};

/// Discrete reasoning-effort levels, ordered from cheapest to most thorough.
/// The ordering index is what level clamping distances are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Minimal,
    Low,
    Medium,
    High,
    #[serde(rename = "xhigh")]
    XHigh,
}

impl ThinkingLevel {
    pub const ALL: [ThinkingLevel; 5] = [
        ThinkingLevel::Minimal,
        ThinkingLevel::Low,
        ThinkingLevel::Medium,
        ThinkingLevel::High,
        ThinkingLevel::XHigh,
    ];

    pub fn index(&self) -> usize {
        match self {
            ThinkingLevel::Minimal => 0,
            ThinkingLevel::Low => 1,
            ThinkingLevel::Medium => 2,
            ThinkingLevel::High => 3,
            ThinkingLevel::XHigh => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Minimal => "minimal",
            ThinkingLevel::Low => "low",
            ThinkingLevel::Medium => "medium",
            ThinkingLevel::High => "high",
            ThinkingLevel::XHigh => "xhigh",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minimal" => Some(ThinkingLevel::Minimal),
            "low" => Some(ThinkingLevel::Low),
            "medium" => Some(ThinkingLevel::Medium),
            "high" => Some(ThinkingLevel::High),
            "xhigh" | "x-high" => Some(ThinkingLevel::XHigh),
            _ => None,
        }
    }

    /// The supported level closest to `self` by ordering index; a tie picks
    /// the lower level.
    pub fn nearest_in(&self, supported: &[ThinkingLevel]) -> Option<ThinkingLevel> {
        let target = self.index() as i64;
        let mut best: Option<ThinkingLevel> = None;
        for candidate in supported {
            let better = match best {
                None => true,
                Some(current) => {
                    let candidate_distance = (candidate.index() as i64 - target).abs();
                    let current_distance = (current.index() as i64 - target).abs();
                    candidate_distance < current_distance
                        || (candidate_distance == current_distance
                            && candidate.index() < current.index())
                }
            };
            if better {
                best = Some(*candidate);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ThinkingLevel::parse("HIGH"), Some(ThinkingLevel::High));
        assert_eq!(ThinkingLevel::parse(" xhigh "), Some(ThinkingLevel::XHigh));
        assert_eq!(ThinkingLevel::parse("max"), None);
    }

    #[test]
    fn nearest_prefers_lower_on_tie() {
        let supported = [ThinkingLevel::Low, ThinkingLevel::High];
        // medium is equidistant from low and high
        assert_eq!(
            ThinkingLevel::Medium.nearest_in(&supported),
            Some(ThinkingLevel::Low)
        );
        assert_eq!(
            ThinkingLevel::XHigh.nearest_in(&supported),
            Some(ThinkingLevel::High)
        );
        assert_eq!(ThinkingLevel::Medium.nearest_in(&[]), None);
    }
}

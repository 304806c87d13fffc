use std::collections::HashMap;

const MAX_TOOL_NAME_BYTES: usize = 64;

/// Deterministic tool-name shortening for dialects that cap names at 64
/// characters, plus the reverse map used during response translation to
/// restore what the client originally sent.
///
/// Truncation is byte-based for parity with the wire limit, backed off to the
/// nearest UTF-8 boundary; a multi-byte name can therefore lose one more
/// character than strictly required.
#[derive(Debug, Clone, Default)]
pub struct ToolNameMap {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl ToolNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorten a name to fit the cap, keeping it unique within this request.
    /// Names that already fit pass through untouched.
    pub fn shorten(&mut self, name: &str) -> String {
        if let Some(existing) = self.forward.get(name) {
            return existing.clone();
        }
        if name.len() <= MAX_TOOL_NAME_BYTES {
            return name.to_string();
        }

        let base = truncate_at_boundary(name, MAX_TOOL_NAME_BYTES);
        let mut candidate = base.to_string();
        let mut counter = 1;
        while self.reverse.contains_key(&candidate) {
            let suffix = format!("_{counter}");
            let head = truncate_at_boundary(name, MAX_TOOL_NAME_BYTES - suffix.len());
            candidate = format!("{head}{suffix}");
            counter += 1;
        }

        self.forward.insert(name.to_string(), candidate.clone());
        self.reverse.insert(candidate.clone(), name.to_string());
        candidate
    }

    /// Restore the original name; unknown names come back unchanged.
    pub fn restore(&self, short: &str) -> String {
        self.reverse
            .get(short)
            .cloned()
            .unwrap_or_else(|| short.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

fn truncate_at_boundary(name: &str, max_bytes: usize) -> &str {
    if name.len() <= max_bytes {
        return name;
    }
    let mut end = max_bytes;
    while end > 0 && !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through() {
        let mut map = ToolNameMap::new();
        assert_eq!(map.shorten("read_file"), "read_file");
        assert!(map.is_empty());
    }

    #[test]
    fn long_names_truncate_and_restore() {
        let mut map = ToolNameMap::new();
        let long = "mcp__filesystem__read_a_very_long_path_with_many_many_components_indeed";
        let short = map.shorten(long);
        assert!(short.len() <= 64);
        assert!(short.starts_with("mcp__"));
        assert_eq!(map.restore(&short), long);
    }

    #[test]
    fn collisions_get_numbered() {
        let mut map = ToolNameMap::new();
        let prefix = "x".repeat(70);
        let first = map.shorten(&format!("{prefix}_alpha"));
        let second = map.shorten(&format!("{prefix}_beta"));
        assert_ne!(first, second);
        assert!(second.ends_with("_1"));
        assert!(second.len() <= 64);
        assert_eq!(map.restore(&second), format!("{prefix}_beta"));
    }

    #[test]
    fn same_name_shortens_stably() {
        let mut map = ToolNameMap::new();
        let long = "y".repeat(80);
        assert_eq!(map.shorten(&long), map.shorten(&long));
    }

    #[test]
    fn multibyte_names_stay_on_char_boundaries() {
        let mut map = ToolNameMap::new();
        let long = "工具".repeat(30);
        let short = map.shorten(&long);
        assert!(short.len() <= 64);
        assert!(short.chars().all(|c| c == '工' || c == '具'));
    }
}

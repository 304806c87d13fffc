use std::collections::VecDeque;

use rand::Rng;

const TOOL_ID_PREFIX: &str = "toolu_";
const TOOL_ID_LEN: usize = 24;
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Mint a fresh tool-call id in the shape the Claude dialect uses.
pub fn mint_tool_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..TOOL_ID_LEN)
        .map(|_| ALPHANUMERIC[rng.random_range(0..ALPHANUMERIC.len())] as char)
        .collect();
    format!("{TOOL_ID_PREFIX}{suffix}")
}

/// Gemini pairs function calls and responses by order, not by id. When
/// converting to a dialect that needs explicit ids, every `functionCall`
/// enqueues a minted id and the matching `functionResponse` dequeues it.
/// Underflow (a response with no recorded call) mints a new id instead of
/// failing.
#[derive(Debug, Default)]
pub struct ToolIdQueue {
    queue: VecDeque<String>,
}

impl ToolIdQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_call(&mut self) -> String {
        let id = mint_tool_id();
        self.queue.push_back(id.clone());
        id
    }

    pub fn pop_response(&mut self) -> String {
        self.queue.pop_front().unwrap_or_else(mint_tool_id)
    }
}

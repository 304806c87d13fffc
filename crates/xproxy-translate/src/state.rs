use std::collections::BTreeMap;

use crate::tool_names::ToolNameMap;

/// One in-flight tool call being reassembled from streamed fragments.
#[derive(Debug, Clone, Default)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Concatenated `arguments` fragments; repaired and parsed only when the
    /// block closes.
    pub arguments: String,
    /// Content-block index assigned in the output dialect.
    pub block_index: u32,
    pub started: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens, non-overlapping with `cached_tokens`.
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_tokens: i64,
    pub cache_creation_tokens: i64,
    pub reasoning_tokens: i64,
    pub total_tokens: i64,
}

/// Per-response translator state. Owned by the caller and handed back on
/// every chunk so the streaming state machine can accumulate across calls;
/// never shared between responses.
#[derive(Debug, Default)]
pub struct StreamState {
    pub response_id: String,
    pub created: i64,
    pub model: String,

    pub message_started: bool,
    /// Open text content-block index, if any.
    pub text_block: Option<u32>,
    /// Open thinking/reasoning content-block index, if any.
    pub thinking_block: Option<u32>,
    pub next_block_index: u32,

    /// Upstream tool-call index → accumulator. The mapping to output block
    /// indices is injective; completion events are emitted in upstream-index
    /// order.
    pub tool_calls: BTreeMap<i64, ToolCall>,
    /// Once true, the terminal finish reason is forced to the tool-call
    /// variant no matter what the upstream said.
    pub saw_tool_call: bool,

    /// The upstream's own terminal reason, kept verbatim.
    pub native_finish_reason: Option<String>,
    pub finish_emitted: bool,
    pub stop_emitted: bool,
    pub usage: Option<Usage>,

    /// Restores original tool names that were shortened during request
    /// translation.
    pub tool_names: ToolNameMap,

    /// Buffered text/reasoning for target dialects whose terminal events
    /// carry the full content; forwarded-only otherwise.
    pub text: String,
    pub thinking: String,

    /// Monotonic sequence number for Responses-API output events.
    pub sequence: i64,
    /// Current output item index for Responses-API output events.
    pub output_index: i64,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_block(&mut self) -> u32 {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }

    pub fn next_sequence(&mut self) -> i64 {
        let value = self.sequence;
        self.sequence += 1;
        value
    }

    /// Take the tool-call accumulators in upstream-index order.
    pub fn take_tool_calls(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.tool_calls)
            .into_values()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_indices_are_sequential() {
        let mut state = StreamState::new();
        assert_eq!(state.next_block(), 0);
        assert_eq!(state.next_block(), 1);
        assert_eq!(state.next_block(), 2);
    }

    #[test]
    fn tool_calls_drain_in_index_order() {
        let mut state = StreamState::new();
        for index in [2i64, 0, 1] {
            state.tool_calls.insert(
                index,
                ToolCall {
                    id: format!("id-{index}"),
                    ..ToolCall::default()
                },
            );
        }
        let drained: Vec<String> = state.take_tool_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(drained, ["id-0", "id-1", "id-2"]);
    }
}

mod collect;
mod context;
mod envelope;
mod pairs;
mod registry;
mod sse;
mod state;
mod tool_ids;
mod tool_names;

pub use context::TranslateContext;
pub use registry::{
    TranslatorEntry, TranslatorRegistry, aggregate_stream_transcript, register_translator,
    registry, translate_request, translate_response_aggregate, translate_response_stream,
};
pub use sse::{SseEvent, SseParser};
pub use state::{StreamState, ToolCall, Usage};
pub use tool_names::ToolNameMap;

pub use xproxy_common::Dialect;

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use serde_json::{Value, json};
use tracing::warn;

use xproxy_common::{Dialect, Schema};

use crate::collect::collect;
use crate::context::TranslateContext;
use crate::envelope;
use crate::sse::{SseParser, render_data, render_done, render_named};
use crate::state::StreamState;

pub type RequestFn = fn(&str, Value, bool) -> Value;
pub type StreamFn = fn(&TranslateContext, &str, &mut StreamState) -> Vec<String>;
pub type AggregateFn = fn(&TranslateContext, Value, &mut StreamState) -> Value;

/// One registered `(from, to)` converter: request rewrite plus streaming and
/// non-streaming response rewrites.
#[derive(Clone, Copy)]
pub struct TranslatorEntry {
    pub request: RequestFn,
    pub stream: StreamFn,
    pub aggregate: AggregateFn,
}

/// `(client dialect, upstream dialect)` → converter triple. Populated once
/// before any request is dispatched; lookups afterwards only take the read
/// lock. Dialects that share a wire schema resolve to the same entry, with
/// envelope shifts applied around it.
#[derive(Default)]
pub struct TranslatorRegistry {
    entries: RwLock<HashMap<(Dialect, Dialect), TranslatorEntry>>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_defaults();
        registry
    }

    pub fn register(
        &self,
        from: Dialect,
        to: Dialect,
        request: RequestFn,
        stream: StreamFn,
        aggregate: AggregateFn,
    ) {
        let mut entries = self.entries.write().expect("translator registry poisoned");
        entries.insert(
            (from, to),
            TranslatorEntry {
                request,
                stream,
                aggregate,
            },
        );
    }

    pub fn get(&self, from: Dialect, to: Dialect) -> Option<TranslatorEntry> {
        let entries = self.entries.read().expect("translator registry poisoned");
        entries.get(&(from, to)).copied()
    }

    fn register_defaults(&self) {
        use crate::pairs::*;

        macro_rules! entry {
            ($from:expr, $to:expr, $module:ident) => {
                self.register(
                    $from,
                    $to,
                    $module::request::transform_request,
                    $module::stream::transform_stream,
                    $module::response::transform_response,
                );
            };
        }

        entry!(Dialect::OpenAI, Dialect::Claude, openai2claude);
        entry!(Dialect::OpenAI, Dialect::Gemini, openai2gemini);
        entry!(Dialect::OpenAI, Dialect::Codex, openai2codex);
        entry!(Dialect::Claude, Dialect::OpenAI, claude2openai);
        entry!(Dialect::Claude, Dialect::Gemini, claude2gemini);
        entry!(Dialect::Claude, Dialect::Codex, claude2codex);
        entry!(Dialect::Gemini, Dialect::OpenAI, gemini2openai);
        entry!(Dialect::Gemini, Dialect::Claude, gemini2claude);
        entry!(Dialect::Gemini, Dialect::Codex, gemini2codex);
        entry!(Dialect::Codex, Dialect::OpenAI, codex2openai);
        entry!(Dialect::Codex, Dialect::Claude, codex2claude);
        entry!(Dialect::Codex, Dialect::Gemini, codex2gemini);
    }
}

/// Process-wide registry with every built-in pair registered.
pub fn registry() -> &'static TranslatorRegistry {
    static REGISTRY: OnceLock<TranslatorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TranslatorRegistry::with_defaults)
}

/// Replace or add a converter triple in the process-wide registry.
pub fn register_translator(
    from: Dialect,
    to: Dialect,
    request: RequestFn,
    stream: StreamFn,
    aggregate: AggregateFn,
) {
    registry().register(from, to, request, stream, aggregate);
}

/// Collapse a dialect to the one the converter table is keyed by. The
/// OpenAI-compatible upstreams and the Responses twins reuse one entry;
/// the Gemini envelope variants reuse the Gemini entry.
fn canonical(dialect: Dialect) -> Dialect {
    match dialect.schema() {
        Schema::OpenAIChat => Dialect::OpenAI,
        Schema::OpenAIResponses => Dialect::Codex,
        Schema::Claude => Dialect::Claude,
        Schema::Gemini => Dialect::Gemini,
    }
}

/// Rewrite a client request into the upstream dialect. Identity when the
/// dialects match, except that the `model` field always takes the
/// caller-supplied value.
pub fn translate_request(
    from: Dialect,
    to: Dialect,
    model: &str,
    body: Value,
    stream: bool,
) -> Value {
    if from == to {
        return overwrite_model(body, model);
    }

    let mut body = body;
    if from.enveloped() {
        body = envelope::unwrap_request(body);
    }

    let (canonical_from, canonical_to) = (canonical(from), canonical(to));
    let mut out = if canonical_from == canonical_to {
        overwrite_model(body, model)
    } else if let Some(entry) = registry().get(canonical_from, canonical_to) {
        (entry.request)(model, body, stream)
    } else {
        warn!(
            from = from.as_key(),
            to = to.as_key(),
            "no request translator registered; passing body through"
        );
        overwrite_model(body, model)
    };

    if to.enveloped() {
        out = envelope::wrap_request(out, model);
    }
    out
}

/// Rewrite one upstream stream chunk (a single SSE data payload, or
/// `[DONE]`) into zero or more fully framed client SSE events. The state
/// object must be the same one across every chunk of a response. A tripped
/// cancellation token stops consumption.
pub fn translate_response_stream(
    ctx: &TranslateContext,
    chunk: &str,
    state: &mut StreamState,
) -> Vec<String> {
    if ctx.cancel.is_cancelled() {
        return Vec::new();
    }

    let unwrapped;
    let chunk = if ctx.to.enveloped() {
        unwrapped = envelope::unwrap_chunk(chunk);
        unwrapped.as_str()
    } else {
        chunk
    };

    let (canonical_from, canonical_to) = (canonical(ctx.from), canonical(ctx.to));
    if canonical_from == canonical_to {
        return passthrough_render(canonical_from, chunk);
    }
    match registry().get(canonical_from, canonical_to) {
        Some(entry) => (entry.stream)(ctx, chunk, state),
        None => Vec::new(),
    }
}

/// Rewrite a complete upstream response document into the client dialect.
pub fn translate_response_aggregate(
    ctx: &TranslateContext,
    body: Value,
    state: &mut StreamState,
) -> Value {
    if ctx.cancel.is_cancelled() {
        return body;
    }

    let mut body = body;
    if ctx.to.enveloped() {
        body = envelope::unwrap_response(body);
    }

    let (canonical_from, canonical_to) = (canonical(ctx.from), canonical(ctx.to));
    if canonical_from == canonical_to {
        return body;
    }
    match registry().get(canonical_from, canonical_to) {
        Some(entry) => (entry.aggregate)(ctx, body, state),
        None => body,
    }
}

/// Reduce a full upstream SSE transcript to the client dialect's complete
/// response document: the transcript is collected into the upstream's
/// document shape first, then run through the pair's aggregate converter.
pub fn aggregate_stream_transcript(
    ctx: &TranslateContext,
    transcript: &str,
    state: &mut StreamState,
) -> Value {
    let mut parser = SseParser::new();
    let mut events = parser.push_str(transcript);
    events.extend(parser.finish());

    let payloads: Vec<String> = events
        .into_iter()
        .map(|event| {
            if ctx.to.enveloped() {
                envelope::unwrap_chunk(&event.data)
            } else {
                event.data
            }
        })
        .filter(|data| !data.is_empty() && data != "[DONE]")
        .collect();

    let document = collect(ctx.to.schema(), &payloads);
    let (canonical_from, canonical_to) = (canonical(ctx.from), canonical(ctx.to));
    if canonical_from == canonical_to {
        return document;
    }
    match registry().get(canonical_from, canonical_to) {
        Some(entry) => (entry.aggregate)(ctx, document, state),
        None => document,
    }
}

fn overwrite_model(mut body: Value, model: &str) -> Value {
    if body.is_object() {
        body["model"] = json!(model);
    }
    body
}

/// Same-schema streaming just needs re-framing into the client's SSE shape.
fn passthrough_render(dialect: Dialect, chunk: &str) -> Vec<String> {
    let payload = chunk.trim();
    if payload.is_empty() {
        return Vec::new();
    }
    if payload == "[DONE]" {
        return vec![render_done()];
    }
    let Ok(value) = serde_json::from_str::<Value>(payload) else {
        return Vec::new();
    };
    match dialect.schema() {
        Schema::Claude | Schema::OpenAIResponses => {
            let event = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("message")
                .to_string();
            vec![render_named(&event, &value)]
        }
        Schema::OpenAIChat | Schema::Gemini => vec![render_data(&value)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rewrites_only_the_model() {
        let body = json!({"model": "old", "messages": [{"role": "user", "content": "hi"}]});
        let out = translate_request(Dialect::OpenAI, Dialect::OpenAI, "new", body.clone(), false);
        assert_eq!(out["model"], json!("new"));
        assert_eq!(out["messages"], body["messages"]);
    }

    #[test]
    fn same_schema_aliases_are_identity() {
        let body = json!({"model": "old", "messages": []});
        let out = translate_request(Dialect::OpenAI, Dialect::Kimi, "kimi-k2", body, true);
        assert_eq!(out["model"], json!("kimi-k2"));
        assert!(out.get("messages").is_some());
    }

    #[test]
    fn gemini_cli_target_gets_enveloped() {
        let body = json!({"contents": [{"role": "user", "parts": [{"text": "x"}]}]});
        let out = translate_request(
            Dialect::Gemini,
            Dialect::GeminiCli,
            "gemini-2.5-pro",
            body,
            true,
        );
        assert_eq!(out["model"], json!("gemini-2.5-pro"));
        assert!(out["request"]["contents"].is_array());
    }

    #[test]
    fn cross_schema_pairs_are_registered() {
        for from in [Dialect::OpenAI, Dialect::Claude, Dialect::Gemini, Dialect::Codex] {
            for to in [Dialect::OpenAI, Dialect::Claude, Dialect::Gemini, Dialect::Codex] {
                if from == to {
                    continue;
                }
                assert!(
                    registry().get(from, to).is_some(),
                    "missing entry {from:?}->{to:?}"
                );
            }
        }
    }

    #[test]
    fn openai_to_claude_request_routes_through_registry() {
        let body = json!({
            "model": "x",
            "messages": [{"role": "user", "content": "hi"}]
        });
        let out = translate_request(Dialect::OpenAI, Dialect::Claude, "claude-sonnet-4-5", body, false);
        assert_eq!(out["model"], json!("claude-sonnet-4-5"));
        assert_eq!(out["messages"][0]["content"], json!("hi"));
        assert!(out.get("max_tokens").is_some());
    }

    #[test]
    fn cancelled_context_stops_streaming() {
        let ctx = TranslateContext::new(Dialect::OpenAI, Dialect::Claude, "m");
        ctx.cancel.cancel();
        let mut state = StreamState::new();
        let out = translate_response_stream(
            &ctx,
            r#"{"type":"message_start","message":{"id":"m","model":"m"}}"#,
            &mut state,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn enveloped_chunks_unwrap_before_translation() {
        let ctx = TranslateContext::new(Dialect::OpenAI, Dialect::GeminiCli, "gemini-2.5-pro");
        let mut state = StreamState::new();
        let chunks = translate_response_stream(
            &ctx,
            r#"{"response":{"responseId":"r1","candidates":[{"content":{"parts":[{"text":"hi"}]},"index":0}]}}"#,
            &mut state,
        );
        assert!(chunks.iter().any(|chunk| chunk.contains("\"content\":\"hi\"")));
    }

    #[test]
    fn passthrough_stream_reframes_named_events() {
        let ctx = TranslateContext::new(Dialect::Claude, Dialect::Claude, "m");
        let mut state = StreamState::new();
        let out = translate_response_stream(&ctx, r#"{"type":"message_stop"}"#, &mut state);
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("event: message_stop\n"));
    }

    #[test]
    fn transcript_aggregation_produces_client_document() {
        let ctx = TranslateContext::new(Dialect::OpenAI, Dialect::Claude, "claude-sonnet-4-5");
        let mut state = StreamState::new();
        let transcript = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-sonnet-4-5\",\"role\":\"assistant\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"done\"}}\n\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":1}}\n\n",
        );
        let out = aggregate_stream_transcript(&ctx, transcript, &mut state);
        assert_eq!(out["object"], json!("chat.completion"));
        assert_eq!(out["choices"][0]["message"]["content"], json!("done"));
        assert_eq!(out["choices"][0]["finish_reason"], json!("stop"));
    }
}

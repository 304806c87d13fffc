use bytes::Bytes;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Event assembled so far: the last `event:` field seen and the data lines
/// accumulated since the previous blank line, already joined with newlines.
#[derive(Debug, Default)]
struct Pending {
    name: Option<String>,
    data: Option<String>,
}

impl Pending {
    fn append_data(&mut self, value: &str) {
        match &mut self.data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => self.data = Some(value.to_string()),
        }
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if self.name.is_none() && self.data.is_none() {
            return None;
        }
        Some(SseEvent {
            event: self.name.take(),
            data: self.data.take().unwrap_or_default(),
        })
    }
}

/// Incremental server-sent-event parser. Bytes go in as they arrive off the
/// wire; complete events come out. A line cut in half by a chunk boundary is
/// carried until the rest shows up.
#[derive(Debug, Default)]
pub struct SseParser {
    carry: String,
    pending: Pending,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        match std::str::from_utf8(chunk) {
            Ok(text) => self.push_str(text),
            Err(_) => Vec::new(),
        }
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(newline) = rest.find('\n') {
            let (line, tail) = rest.split_at(newline);
            rest = &tail[1..];
            if self.carry.is_empty() {
                self.consume_line(line, &mut events);
            } else {
                self.carry.push_str(line);
                let joined = std::mem::take(&mut self.carry);
                self.consume_line(&joined, &mut events);
            }
        }

        self.carry.push_str(rest);
        events
    }

    /// Flush whatever is still buffered at end of stream.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.carry.is_empty() {
            let line = std::mem::take(&mut self.carry);
            self.consume_line(&line, &mut events);
        }
        if let Some(event) = self.pending.take_event() {
            events.push(event);
        }
        events
    }

    fn consume_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            if let Some(event) = self.pending.take_event() {
                events.push(event);
            }
            return;
        }

        // A field is everything before the first colon; the value drops at
        // most one leading space. A line with no colon is a field with an
        // empty value, a line starting with a colon is a comment.
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => {
                self.pending.name = (!value.is_empty()).then(|| value.to_string());
            }
            "data" => self.pending.append_data(value),
            _ => {}
        }
    }
}

/// Render a named SSE event the way Claude and the Responses API frame them.
pub fn render_named(event: &str, data: &Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

/// Render a bare data event the way Chat Completions and Gemini frame them.
pub fn render_data(data: &Value) -> String {
    format!("data: {data}\n\n")
}

pub fn render_done() -> String {
    "data: [DONE]\n\n".to_string()
}

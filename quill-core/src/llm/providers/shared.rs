//! Helpers shared by streaming adapters: SSE frame decoding and incremental
//! tool-call assembly.

use serde_json::Value;

use crate::llm::content::FunctionCall;

/// Incremental decoder for server-sent-event streams. Raw bytes go in via
/// [`feed`](Self::feed); complete `data:` payloads come out of
/// [`next_payload`](Self::next_payload). Events split across network chunks
/// stay buffered until their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
    }

    /// Drain the next complete event and return its data payload. Events
    /// without data lines (comments, keep-alives) are consumed silently.
    pub fn next_payload(&mut self) -> Option<String> {
        while let Some(event) = self.take_event() {
            if let Some(payload) = data_payload(&event) {
                return Some(payload);
            }
        }
        None
    }

    /// Cut the buffer at the first blank line. A blank line only counts
    /// once its own newline has arrived, so a half-received event is never
    /// surfaced.
    fn take_event(&mut self) -> Option<String> {
        let mut offset = 0;
        let mut cut = None;
        for line in self.buffer.split_inclusive('\n') {
            let line_end = offset + line.len();
            if line.ends_with('\n') && line.trim_end_matches(['\r', '\n']).is_empty() {
                cut = Some((offset, line_end));
                break;
            }
            offset = line_end;
        }

        let (event_end, drain_end) = cut?;
        let event = self.buffer[..event_end].to_string();
        self.buffer.drain(..drain_end);
        Some(event)
    }
}

/// Join the `data:` lines of one event. `str::lines` already drops the
/// carriage return of CRLF streams, and comment lines (`:` prefixed) never
/// match the prefix, so no separate handling is needed for either.
fn data_payload(event: &str) -> Option<String> {
    let mut payload = String::new();
    for line in event.lines() {
        let Some(rest) = line.strip_prefix("data:") else {
            continue;
        };
        if !payload.is_empty() {
            payload.push('\n');
        }
        payload.push_str(rest.strip_prefix(' ').unwrap_or(rest));
    }
    (!payload.is_empty()).then_some(payload)
}

/// Assembles streamed tool calls from indexed fragments. A call is only
/// surfaced once the stream ends, so the loop never sees partial JSON
/// arguments.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: Vec<PendingCall>,
}

#[derive(Debug, Default, Clone)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one batch of tool-call deltas. Each delta names its slot via
    /// an `index` field; deltas without one fall back to their position in
    /// the batch.
    pub fn absorb(&mut self, deltas: &[Value]) {
        for (position, delta) in deltas.iter().enumerate() {
            let slot = delta["index"]
                .as_u64()
                .map(|index| index as usize)
                .unwrap_or(position);
            if self.slots.len() <= slot {
                self.slots.resize_with(slot + 1, PendingCall::default);
            }
            self.slots[slot].merge(delta);
        }
    }

    /// Finish every slot, preserving index order. Slots that never received
    /// a name are dropped.
    pub fn finish(self) -> Vec<FunctionCall> {
        self.slots
            .into_iter()
            .enumerate()
            .filter_map(|(position, slot)| slot.into_call(position))
            .collect()
    }
}

impl PendingCall {
    fn merge(&mut self, delta: &Value) {
        if let Some(id) = delta["id"].as_str() {
            self.id = Some(id.to_owned());
        }
        let Some(function) = delta.get("function") else {
            return;
        };
        if let Some(name) = function["name"].as_str() {
            self.name = Some(name.to_owned());
        }
        match function.get("arguments") {
            Some(Value::String(fragment)) => self.arguments.push_str(fragment),
            Some(structured @ (Value::Object(_) | Value::Array(_))) => {
                self.arguments.push_str(&structured.to_string());
            }
            _ => {}
        }
    }

    /// Unparseable argument accumulations degrade to an empty object rather
    /// than surfacing broken JSON to the loop.
    fn into_call(self, position: usize) -> Option<FunctionCall> {
        let name = self.name?;
        let args = if self.arguments.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.arguments)
                .unwrap_or_else(|_| Value::Object(Default::default()))
        };
        Some(FunctionCall {
            id: self
                .id
                .unwrap_or_else(|| format!("call_{position}")),
            name,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decoder_holds_partial_events_until_terminated() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"data: {\"a\":");
        assert_eq!(decoder.next_payload(), None);
        decoder.feed(b"1}\n");
        assert_eq!(decoder.next_payload(), None);
        decoder.feed(b"\n");
        assert_eq!(decoder.next_payload().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn decoder_merges_multiline_data_and_skips_keep_alives() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b": keep-alive\ndata: {\"a\":1}\ndata: {\"b\":2}\n\n");
        assert_eq!(
            decoder.next_payload().as_deref(),
            Some("{\"a\":1}\n{\"b\":2}")
        );
        assert_eq!(decoder.next_payload(), None);
    }

    #[test]
    fn decoder_handles_crlf_framing() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"data: first\r\n\r\ndata: second\r\n\r\n");
        assert_eq!(decoder.next_payload().as_deref(), Some("first"));
        assert_eq!(decoder.next_payload().as_deref(), Some("second"));
    }

    #[test]
    fn decoder_consumes_dataless_events_silently() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b": ping\n\ndata: real\n\n");
        assert_eq!(decoder.next_payload().as_deref(), Some("real"));
    }

    #[test]
    fn assembler_drops_unnamed_slots() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&[json!({"index": 0, "id": "call_x"})]);
        assert!(assembler.finish().is_empty());
    }

    #[test]
    fn assembler_routes_by_explicit_index() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&[json!({
            "index": 2,
            "id": "call_3",
            "function": {
                "name": "grep_search",
                "arguments": "{\"pattern\":\"fn main\"}"
            }
        })]);

        let calls = assembler.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_3");
        assert_eq!(calls[0].name, "grep_search");
        assert_eq!(calls[0].args["pattern"], "fn main");
    }

    #[test]
    fn assembler_accumulates_arguments_across_deltas() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&[
            json!({"index": 0, "id": "c1", "function": {"name": "read_file", "arguments": "{\"pa"}}),
        ]);
        assembler.absorb(&[json!({"index": 0, "function": {"arguments": "th\":\"a.txt\"}"}})]);

        let calls = assembler.finish();
        assert_eq!(calls[0].args["path"], "a.txt");
    }

    #[test]
    fn assembler_degrades_malformed_arguments_to_empty_object() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&[json!({"index": 0, "function": {"name": "x", "arguments": "{not json"}})]);

        let calls = assembler.finish();
        assert!(calls[0].args.as_object().unwrap().is_empty());
        assert_eq!(calls[0].id, "call_0");
    }

    #[test]
    fn assembler_accepts_structured_argument_values() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&[json!({
            "index": 0,
            "function": {"name": "list_dir", "arguments": {"path": "src"}}
        })]);

        let calls = assembler.finish();
        assert_eq!(calls[0].args["path"], "src");
    }
}

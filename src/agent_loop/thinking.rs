//! Classifies streamed text into `<think>` spans and visible output.
//!
//! Markers are retained in the output and belong to the span they open or
//! close. Spans nest: only the close that returns depth to zero ends
//! thinking. A close marker seen outside any span is ordinary text.
//!
//! A marker may be split across increments (`"<thi"` + `"nk>"`). The
//! classifier holds back a trailing marker prefix until the next call, and
//! [`SpanClassifier::finish`] releases it at end of stream.

use std::time::Duration;

use tokio::time::Instant;

pub const OPEN_MARKER: &str = "<think>";
pub const CLOSE_MARKER: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Thinking,
    Visible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub text: String,
}

/// Output for one increment: adjacent same-kind text coalesced, plus the
/// nesting depth after the increment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedChunk {
    pub spans: Vec<Span>,
    pub depth: usize,
}

impl ClassifiedChunk {
    fn push(&mut self, kind: SpanKind, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(text),
            _ => self.spans.push(Span {
                kind,
                text: text.to_string(),
            }),
        }
    }

    pub fn text_of(&self, kind: SpanKind) -> String {
        self.spans
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.text.as_str())
            .collect()
    }
}

/// Per-response span tracker.
#[derive(Debug, Default)]
pub struct SpanClassifier {
    carry: String,
    depth: usize,
    close_times: Vec<Instant>,
}

impl SpanClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn in_span(&self) -> bool {
        self.depth > 0
    }

    /// Instants at which an outermost span closed.
    pub fn close_times(&self) -> &[Instant] {
        &self.close_times
    }

    /// Last outermost close minus `start`; `None` if no span ever closed.
    pub fn thinking_time(&self, start: Instant) -> Option<Duration> {
        self.close_times
            .last()
            .map(|closed| closed.saturating_duration_since(start))
    }

    fn current_kind(&self) -> SpanKind {
        if self.in_span() {
            SpanKind::Thinking
        } else {
            SpanKind::Visible
        }
    }

    /// Classify one text increment.
    pub fn classify(&mut self, increment: &str) -> ClassifiedChunk {
        let mut buffer = std::mem::take(&mut self.carry);
        buffer.push_str(increment);

        let mut out = ClassifiedChunk::default();
        let mut rest = buffer.as_str();

        while let Some(lt) = rest.find('<') {
            out.push(self.current_kind(), &rest[..lt]);
            let tail = &rest[lt..];

            if let Some(after) = tail.strip_prefix(OPEN_MARKER) {
                self.depth += 1;
                out.push(SpanKind::Thinking, OPEN_MARKER);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(CLOSE_MARKER) {
                if self.in_span() {
                    out.push(SpanKind::Thinking, CLOSE_MARKER);
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.close_times.push(Instant::now());
                    }
                } else {
                    out.push(SpanKind::Visible, CLOSE_MARKER);
                }
                rest = after;
            } else if OPEN_MARKER.starts_with(tail) || CLOSE_MARKER.starts_with(tail) {
                // Possible marker cut off by the increment boundary.
                self.carry = tail.to_string();
                rest = "";
                break;
            } else {
                out.push(self.current_kind(), "<");
                rest = &tail[1..];
            }
        }
        out.push(self.current_kind(), rest);

        out.depth = self.depth;
        out
    }

    /// Release any held-back marker prefix at end of stream.
    pub fn finish(&mut self) -> ClassifiedChunk {
        let mut out = ClassifiedChunk::default();
        let held = std::mem::take(&mut self.carry);
        out.push(self.current_kind(), &held);
        out.depth = self.depth;
        out
    }
}

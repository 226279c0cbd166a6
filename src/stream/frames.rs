// src/stream/frames.rs
use serde::Deserialize;

/// End-of-stream sentinel sent by the completion API as a bare data line.
const DONE_SENTINEL: &str = "[DONE]";
const DATA_PREFIX: &str = "data: ";

/// JSON payload of one `data:` line.
#[derive(Debug, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub choices: Vec<FrameChoice>,
}

#[derive(Debug, Deserialize)]
pub struct FrameChoice {
    #[serde(default)]
    pub delta: FrameDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct FrameDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamFrame {
    /// The text fragment carried by this frame, if any.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// One incremental text fragment for the in-flight assistant message.
    Delta(String),
    /// The `[DONE]` sentinel: no further lines may be processed.
    Done,
}

/// Extracts event-stream frames from decoded text.
///
/// The parser owns the pending buffer (the not-yet-newline-terminated tail
/// carried between chunk reads). A line is only consumed once it parses:
/// when a `data:` line holds JSON that is still syntactically incomplete
/// because the chunk boundary cut it off, the line stays at the front of the
/// buffer and scanning suspends until more bytes arrive. Every scan starts
/// from the buffer start, so a frame is forwarded exactly once.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly decoded text to the pending buffer.
    pub fn push(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Text still waiting for a newline or for the rest of its JSON.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Scans the buffer for the next frame event.
    ///
    /// Returns None when no complete, parseable line remains; callers then
    /// feed more chunks and scan again.
    pub fn next_event(&mut self) -> Option<FrameEvent> {
        while let Some(newline) = self.buffer.find('\n') {
            let raw = &self.buffer[..newline];
            let line = raw.strip_suffix('\r').unwrap_or(raw).to_string();

            // Keep-alive comments and blank separators carry nothing.
            if line.is_empty() || line.starts_with(':') {
                self.consume_line(newline);
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                self.consume_line(newline);
                continue;
            };

            if payload.trim() == DONE_SENTINEL {
                self.consume_line(newline);
                return Some(FrameEvent::Done);
            }

            match serde_json::from_str::<serde_json::Value>(payload) {
                Ok(value) => {
                    self.consume_line(newline);
                    // Syntactically valid JSON of an unexpected shape is
                    // dropped, matching how unknown frame kinds are skipped.
                    let content = serde_json::from_value::<StreamFrame>(value)
                        .ok()
                        .and_then(StreamFrame::into_content);
                    if let Some(content) = content {
                        return Some(FrameEvent::Delta(content));
                    }
                }
                Err(_) => {
                    // The line was cut off mid-frame by the chunk boundary.
                    // Leave it in place and wait for the rest of the bytes.
                    tracing::trace!(
                        pending_bytes = self.buffer.len(),
                        "partial event-stream frame, waiting for more data"
                    );
                    return None;
                }
            }
        }
        None
    }

    fn consume_line(&mut self, newline: usize) {
        self.buffer.drain(..=newline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}}}}]}}\n"
        )
    }

    #[test]
    fn parses_a_complete_delta_line() {
        let mut parser = FrameParser::new();
        parser.push(&delta_line("Hello"));
        assert_eq!(
            parser.next_event(),
            Some(FrameEvent::Delta("Hello".to_string()))
        );
        assert_eq!(parser.next_event(), None);
        assert!(parser.pending().is_empty());
    }

    #[test]
    fn strips_trailing_carriage_return() {
        let mut parser = FrameParser::new();
        parser.push("data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n");
        assert_eq!(parser.next_event(), Some(FrameEvent::Delta("x".to_string())));
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let mut parser = FrameParser::new();
        parser.push(":keepalive\n\n");
        parser.push(&delta_line("a"));
        parser.push("\n:ping\n");
        parser.push(&delta_line("b"));
        assert_eq!(parser.next_event(), Some(FrameEvent::Delta("a".to_string())));
        assert_eq!(parser.next_event(), Some(FrameEvent::Delta("b".to_string())));
        assert_eq!(parser.next_event(), None);
    }

    #[test]
    fn ignores_lines_without_data_prefix() {
        let mut parser = FrameParser::new();
        parser.push("event: message\n");
        parser.push(&delta_line("ok"));
        assert_eq!(parser.next_event(), Some(FrameEvent::Delta("ok".to_string())));
    }

    #[test]
    fn detects_done_sentinel_without_parsing_it_as_json() {
        let mut parser = FrameParser::new();
        parser.push("data: [DONE]\n");
        assert_eq!(parser.next_event(), Some(FrameEvent::Done));
    }

    #[test]
    fn tolerates_whitespace_around_the_sentinel() {
        let mut parser = FrameParser::new();
        parser.push("data:  [DONE] \r\n");
        assert_eq!(parser.next_event(), Some(FrameEvent::Done));
    }

    #[test]
    fn retains_a_line_cut_off_mid_frame() {
        let mut parser = FrameParser::new();
        // The chunk boundary fell inside the JSON object.
        parser.push("data: {\"choices\":[{\"delta\"");
        assert_eq!(parser.next_event(), None);
        parser.push(":{\"content\":\"Hello\"}}]}\n");
        assert_eq!(
            parser.next_event(),
            Some(FrameEvent::Delta("Hello".to_string()))
        );
    }

    #[test]
    fn retains_a_newline_terminated_partial_frame() {
        // A malformed line with its newline already present must not be
        // consumed; it stays pending so no later frame is misattributed.
        let mut parser = FrameParser::new();
        parser.push("data: {\"choices\":[{\"delta\"\n");
        assert_eq!(parser.next_event(), None);
        assert!(parser.pending().starts_with("data: "));
    }

    #[test]
    fn drops_valid_json_of_unknown_shape() {
        let mut parser = FrameParser::new();
        parser.push("data: {\"unrelated\":true}\n");
        parser.push(&delta_line("next"));
        assert_eq!(
            parser.next_event(),
            Some(FrameEvent::Delta("next".to_string()))
        );
    }

    #[test]
    fn frame_without_content_is_skipped() {
        let mut parser = FrameParser::new();
        parser.push("data: {\"choices\":[{\"delta\":{}}]}\n");
        parser.push(&delta_line("tail"));
        assert_eq!(
            parser.next_event(),
            Some(FrameEvent::Delta("tail".to_string()))
        );
    }

    #[test]
    fn empty_content_is_not_forwarded() {
        let mut parser = FrameParser::new();
        parser.push(&delta_line(""));
        assert_eq!(parser.next_event(), None);
    }
}

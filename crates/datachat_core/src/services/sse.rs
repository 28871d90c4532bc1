//! Incremental Server-Sent Events decoder.
//!
//! Bytes arrive in arbitrary pieces from the HTTP body; frames come out once
//! their terminating blank line has been seen. Handles `\n` and `\r\n` line
//! endings, multi-line `data:` fields, comment lines, and an optional single
//! space after the field colon.

/// One dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, if any (None means the default "message" kind)
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// `id:` field, if any
    pub id: Option<String>,
}

impl SseFrame {
    /// Whether this frame has the given event kind.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.event.as_deref() == Some(kind)
    }
}

/// Stateful line-oriented decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    has_fields: bool,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and collect every frame they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        // Split on '\n' at byte level so multi-byte characters split across
        // reads are only decoded once the whole line is present.
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flush at end of stream: an unterminated trailing frame is dispatched.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.process_line(line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event = Some(value.to_string());
                self.has_fields = true;
            }
            "data" => {
                self.data.push(value.to_string());
                self.has_fields = true;
            }
            "id" => {
                self.id = Some(value.to_string());
                self.has_fields = true;
            }
            // retry and unknown fields are ignored
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if !self.has_fields {
            return None;
        }
        self.has_fields = false;
        Some(SseFrame {
            event: self.event.take().filter(|e| !e.is_empty()),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.take(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"content\":\"a\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"content\":\"a\"}");
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: hel").is_empty());
        assert!(decoder.push(b"lo\n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames[0].data, "hello");
    }

    #[test]
    fn test_multibyte_split_across_reads() {
        let payload = "data: 销售\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        // split inside the first CJK character
        assert!(decoder.push(&payload[..7]).is_empty());
        let frames = decoder.push(&payload[7..]);
        assert_eq!(frames[0].data, "销售");
    }

    #[test]
    fn test_event_kind_and_id() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: final\r\nid: 7\r\ndata:\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_kind("final"));
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(frames[0].data, "");
    }

    #[test]
    fn test_multi_line_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\ndata: one\ndata:two\n\n: ping\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "one\ntwo");
    }

    #[test]
    fn test_several_frames_in_one_read() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: a\n\ndata: b\n\nevent: final\ndata: {}\n\n");
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].data, "b");
        assert!(frames[2].is_kind("final"));
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.data, "tail");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_blank_lines_alone_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"\n\n\n").is_empty());
        assert!(decoder.finish().is_none());
    }
}

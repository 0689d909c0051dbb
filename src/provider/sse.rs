use crate::error::{Error, Result};

/// Event type whose payloads are heartbeats and never parsed.
const PING: &str = "ping";

/// One `data:` line together with the event type in effect when it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Line-oriented SSE decoder.
///
/// - Splits the byte stream on `\n` (a trailing `\r` is dropped)
/// - `event:` sets the current event type until the next `event:` line
/// - every `data:` line becomes one frame, except under the ping event type
/// - blank lines, `:` comments and other fields are ignored
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<SseFrame>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            if let Some(frame) = self.line(&line[..line.len() - 1]) {
                out.push(frame);
            }
        }

        out
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Result<SseFrame>> {
        let rest = std::mem::take(&mut self.buf);
        self.line(&rest)
    }

    fn line(&mut self, line: &[u8]) -> Option<Result<SseFrame>> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return None;
        }

        let s = match std::str::from_utf8(line) {
            Ok(s) => s,
            Err(e) => return Some(Err(Error::decode(&String::from_utf8_lossy(line), e))),
        };

        if s.starts_with(':') {
            return None;
        }

        if let Some(rest) = s.strip_prefix("event:") {
            self.event = Some(field_value(rest).to_string());
            return None;
        }

        let data = field_value(s.strip_prefix("data:")?);
        if self.event.as_deref() == Some(PING) {
            return None;
        }

        Some(Ok(SseFrame {
            event: self.event.clone(),
            data: data.to_string(),
        }))
    }
}

fn field_value(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(decoder: &mut SseDecoder, input: &[u8]) -> Vec<SseFrame> {
        decoder
            .push(input)
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn event_type_persists_across_data_lines() {
        let mut d = SseDecoder::new();
        let got = frames(
            &mut d,
            b"event: content_block_delta\ndata: {\"a\":1}\n\ndata: {\"a\":2}\n",
        );
        assert_eq!(got.len(), 2);
        assert!(got
            .iter()
            .all(|f| f.event.as_deref() == Some("content_block_delta")));
        assert_eq!(got[1].data, "{\"a\":2}");
    }

    #[test]
    fn ping_payload_is_dropped_unparsed() {
        let mut d = SseDecoder::new();
        let got = frames(
            &mut d,
            b"event: ping\ndata: not json at all\n\nevent: message_stop\ndata: {}\n",
        );
        assert_eq!(
            got,
            vec![SseFrame {
                event: Some("message_stop".into()),
                data: "{}".into()
            }]
        );
    }

    #[test]
    fn comments_blank_lines_and_crlf_are_handled() {
        let mut d = SseDecoder::new();
        let got = frames(&mut d, b": keep-alive\r\n\r\nid: 7\r\ndata: [DONE]\r\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].event, None);
        assert_eq!(got[0].data, "[DONE]");
    }

    #[test]
    fn lines_split_across_chunks_and_multibyte_chars() {
        let input = "event: content_block_delta\ndata: {\"text\":\"héllo\"}\n".as_bytes();
        let split = input.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut d = SseDecoder::new();
        assert!(frames(&mut d, &input[..split]).is_empty());
        let got = frames(&mut d, &input[split..]);
        assert_eq!(got[0].data, "{\"text\":\"héllo\"}");
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut d = SseDecoder::new();
        assert!(frames(&mut d, b"data: tail").is_empty());
        let last = d.finish().unwrap().unwrap();
        assert_eq!(last.data, "tail");
        assert!(d.finish().is_none());
    }

    #[test]
    fn invalid_utf8_line_is_a_decode_error() {
        let mut d = SseDecoder::new();
        let out = d.push(b"data: \xff\xfe\n");
        assert!(matches!(out.as_slice(), [Err(Error::Decode { .. })]));
    }
}

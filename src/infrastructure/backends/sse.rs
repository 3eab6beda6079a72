#[cfg(test)]
#[path = "sse_test.rs"]
mod tests;

use memchr::memmem;

const EVENT_SEPARATOR: &[u8] = b"\n\n";
const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    Done,
}

/// Incremental Server-Sent-Events framer. Network chunks are appended as raw
/// bytes and only complete events (terminated by a blank line) are decoded,
/// so chunk boundaries may fall anywhere, including inside a UTF-8 sequence.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer
            .extend(bytes.iter().filter(|byte| return **byte != b'\r'));

        let mut frames: Vec<SseFrame> = vec![];
        while let Some(idx) = memmem::find(&self.buffer, EVENT_SEPARATOR) {
            let block = self
                .buffer
                .drain(..idx + EVENT_SEPARATOR.len())
                .collect::<Vec<u8>>();

            if let Some(frame) = parse_block(&block[..idx]) {
                frames.push(frame);
            }
        }

        return frames;
    }

    /// Whether the unterminated tail of the buffer is a `[DONE]` marker that
    /// arrived without its trailing blank line.
    pub fn has_pending_done(&self) -> bool {
        let tail = String::from_utf8_lossy(&self.buffer);
        let payload = tail
            .trim()
            .strip_prefix(DATA_PREFIX)
            .map(|val| return val.trim());

        return payload == Some(DONE_MARKER);
    }

    /// Flushes whatever is left once the connection has closed.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let block = std::mem::take(&mut self.buffer);
        return parse_block(&block);
    }
}

fn parse_block(block: &[u8]) -> Option<SseFrame> {
    let text = match std::str::from_utf8(block) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = ?err, "Discarding stream event with invalid UTF-8");
            return None;
        }
    };

    // Comments (`: keep-alive`) and fields other than `data` are ignored.
    let data_lines = text
        .lines()
        .filter_map(|line| return line.strip_prefix(DATA_PREFIX))
        .map(|line| return line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<&str>>();

    if data_lines.is_empty() {
        return None;
    }

    let payload = data_lines.join("\n").trim().to_string();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_MARKER {
        return Some(SseFrame::Done);
    }

    return Some(SseFrame::Data(payload));
}

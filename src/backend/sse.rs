//! Incremental decoder for `text/event-stream` bodies.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Frames without an explicit event name are plain messages.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Buffers chunks and yields complete frames.
///
/// Frames are terminated by a blank line. Comment lines (`: ping`), `id:` and `retry:`
/// fields are skipped. A trailing `\r` is held back until the next chunk shows whether it
/// starts a `\r\n` pair. Several `data:` lines in one frame are joined with `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte-level entry point; a multi-byte character split across chunks is held back
    /// until it is complete.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let tail = self.pending.split_off(valid);
        let head = std::mem::replace(&mut self.pending, tail);
        let text = String::from_utf8_lossy(&head).into_owned();
        self.push(&text)
    }

    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let held_cr = self.buffer.ends_with('\r');
        if held_cr {
            self.buffer.pop();
        }
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n").replace('\r', "\n");
        }

        let mut frames = Vec::new();
        while let Some(block) = self.extract_block() {
            if let Some(frame) = Self::parse_block(&block) {
                frames.push(frame);
            }
        }
        if held_cr {
            self.buffer.push('\r');
        }
        frames
    }

    fn extract_block(&mut self) -> Option<String> {
        let pos = self.buffer.find("\n\n")?;
        let block = self.buffer[..pos].to_string();
        self.buffer.drain(..pos + 2);
        Some(block)
    }

    fn parse_block(block: &str) -> Option<SseFrame> {
        let mut event = None;
        let mut data: Option<String> = None;

        for line in block.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => match data.as_mut() {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                "event" => event = Some(value.to_string()),
                _ => {}
            }
        }

        data.map(|data| SseFrame { event, data })
    }
}

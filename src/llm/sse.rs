//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network chunks split lines (and UTF-8 sequences) at arbitrary points, so bytes
//! are buffered until a full line is available. Only `data` fields are kept;
//! comments and other fields are skipped.

use bytes::{Buf, BytesMut};

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: BytesMut,
    data: Option<String>,
}

impl SseDecoder {
    /// Feeds raw bytes and returns the data payloads of every event completed by them.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let mut line = &line[..pos];
            if let [rest @ .., b'\r'] = line {
                line = rest;
            }
            if let Some(event) = self.line(&String::from_utf8_lossy(line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes an event left open when the body ended without a blank line.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let rest = self.buf.split_to(self.buf.len());
            let line = String::from_utf8_lossy(rest.chunk()).trim_end_matches('\r').to_owned();
            if let Some(event) = self.line(&line) {
                return Some(event);
            }
        }
        self.data.take()
    }

    fn line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.data.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            }
        }
        None
    }
}

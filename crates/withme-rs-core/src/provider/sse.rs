//! Incremental decoder for chat-completions server-sent events.

use log::warn;
use serde_json::Value;

const DONE_SENTINEL: &str = "[DONE]";

/// Turns raw response bytes into reply fragments.
///
/// Bytes are buffered until a full line arrives, so JSON payloads and
/// multi-byte characters split across chunks are carried over intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and return the content fragments it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<_>>();
            self.handle_line(&line, &mut fragments);
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        fragments
    }

    /// Flush a trailing line left without a newline at end of body.
    pub fn finish(&mut self) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.done || self.buffer.is_empty() {
            return fragments;
        }
        let line = std::mem::take(&mut self.buffer);
        self.handle_line(&line, &mut fragments);
        fragments
    }

    fn handle_line(&mut self, raw: &[u8], fragments: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();
        if data == DONE_SENTINEL {
            self.done = true;
            return;
        }
        match serde_json::from_str::<Value>(data) {
            Ok(event) => {
                if let Some(content) = event["choices"][0]["delta"]["content"].as_str() {
                    if !content.is_empty() {
                        fragments.push(content.to_string());
                    }
                }
            }
            Err(err) => warn!(
                "skipping malformed stream event (len={}): {}",
                data.len(),
                err
            ),
        }
    }
}

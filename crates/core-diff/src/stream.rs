//! Incremental parsing of streamed assistant output.
//!
//! Chunks are appended as they arrive; every fenced block whose closing fence
//! has been seen is parsed exactly once. The concatenation of all emitted
//! suggestions equals `parse(full_text)` up to ids.

use crate::parser::{FENCED_BLOCK_PATTERN, parse_block};
use crate::suggestion::EditSuggestion;

#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    text: String,
    /// Byte offset after the last closed fence already consumed.
    consumed: usize,
    emitted: usize,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return suggestions from blocks closed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<EditSuggestion> {
        self.text.push_str(chunk);
        let mut out = Vec::new();
        while let Some(caps) = FENCED_BLOCK_PATTERN.captures_at(&self.text, self.consumed) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            if let Some(s) = parse_block(body.as_str()) {
                out.push(s);
            }
            self.consumed = whole.end();
        }
        self.emitted += out.len();
        out
    }

    /// Full text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Total suggestions emitted across all pushes.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// True when a `latex-diff` fence was opened after the last closed block.
    pub fn has_open_block(&self) -> bool {
        self.text[self.consumed..].contains("```latex-diff")
    }

    /// Consume the accumulator, returning the complete response text.
    pub fn finish(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const RESPONSE: &str = "Intro\n```latex-diff\n@@ -1,1 +1,1 @@\n-a\n+b\n```\nmid\n```latex-diff\n@@ -4 +4 @@\n+inserted\n```\nbye";

    #[test]
    fn emits_when_block_closes() {
        let mut acc = ResponseAccumulator::new();
        assert!(acc.push("Intro\n```latex-diff\n@@ -1,1 +1,1 @@\n-a\n").is_empty());
        assert!(acc.has_open_block());
        let got = acc.push("+b\n```\nmid\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].suggested, "b");
        assert!(!acc.has_open_block());
    }

    #[test]
    fn byte_by_byte_matches_full_parse() {
        let mut acc = ResponseAccumulator::new();
        let mut streamed = Vec::new();
        let mut buf = [0u8; 4];
        for ch in RESPONSE.chars() {
            streamed.extend(acc.push(ch.encode_utf8(&mut buf)));
        }
        let full = parse(RESPONSE);
        assert_eq!(streamed.len(), full.len());
        for (a, b) in streamed.iter().zip(full.iter()) {
            assert_eq!(a.original, b.original);
            assert_eq!(a.suggested, b.suggested);
            assert_eq!(a.start_line, b.start_line);
            assert_eq!(a.original_line_count, b.original_line_count);
        }
        assert_eq!(acc.emitted(), 2);
        assert_eq!(acc.finish(), RESPONSE);
    }
}

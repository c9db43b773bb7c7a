// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire framing for the encoded serial stream.
//!
//! One frame carries the decimal character codes of one text line, space
//! separated, terminated by the token pair `13 10` (the CR and LF codes):
//!
//! ```text
//! "a,b"  <-->  "97 44 98 13 10"
//! ```
//!
//! The decoder is incremental: bytes (or larger chunks) are pushed as they
//! arrive and a complete line is returned once a terminator pair is seen.
//! The first terminator after a reset is a no-op that discards the partial
//! frame; only the second one yields a line. Callers must budget for this
//! one-frame latency.

/// Encode one text line as a space-separated decimal token stream with the
/// `13 10` terminator pair appended.
///
/// No escaping is performed; any character whose code round-trips through
/// decimal text is supported.
pub fn encode_line(line: &str) -> String {
    let mut tokens: Vec<String> = line.chars().map(|c| (c as u32).to_string()).collect();
    tokens.push("13".to_string());
    tokens.push("10".to_string());
    tokens.join(" ")
}

/// Decode a token stream back into text.
///
/// Malformed (non-numeric or out-of-range) tokens are silently skipped.
/// The trailing terminator characters are stripped so that a full frame
/// decodes to exactly the line that was encoded.
pub fn decode_tokens(tokens: &str) -> String {
    let decoded: String = tokens
        .split(' ')
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse::<u32>().ok())
        .filter_map(char::from_u32)
        .collect();
    decoded.trim_end_matches(&['\r', '\n'][..]).to_string()
}

/// Incremental frame boundary scanner for the encoded stream.
///
/// Accumulates pushed chunks, splits on spaces, and scans for an adjacent
/// `13` `10` token pair. A pending-terminator flag makes the first pair
/// after a reset a no-op (the partial frame before it is discarded); the
/// next pair emits the accumulated frame and clears both buffer and flag.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: String,
    crlf_pending: bool,
    frames_emitted: u64,
    tokens_dropped: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the encoded stream; returns the decoded line when a
    /// genuine boundary is reached.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        let frame = self.push_raw(chunk)?;
        self.tokens_dropped += frame
            .split(' ')
            .filter(|t| !t.is_empty())
            .filter(|t| t.parse::<u32>().ok().and_then(char::from_u32).is_none())
            .count() as u64;
        Some(decode_tokens(&frame))
    }

    /// Feed a chunk of the encoded stream; returns the raw token frame
    /// (terminator tokens included) when a genuine boundary is reached.
    ///
    /// The producing side forwards frames in this still-encoded form; the
    /// consuming side decodes them with [`decode_tokens`].
    pub fn push_raw(&mut self, chunk: &str) -> Option<String> {
        self.buf.push_str(chunk);

        let tokens: Vec<&str> = self.buf.split(' ').collect();
        let found = (1..tokens.len()).any(|i| tokens[i - 1] == "13" && tokens[i] == "10");
        if !found {
            return None;
        }

        if self.crlf_pending {
            let frame = tokens
                .iter()
                .filter(|t| !t.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!("Read complete frame: {}", frame);
            self.buf.clear();
            self.crlf_pending = false;
            self.frames_emitted += 1;
            Some(frame)
        } else {
            self.buf.clear();
            self.crlf_pending = true;
            None
        }
    }

    /// Whether a terminator has been seen since the last emitted frame.
    pub fn terminator_pending(&self) -> bool {
        self.crlf_pending
    }

    /// Frames emitted since construction.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Malformed tokens dropped from emitted frames since construction.
    pub fn tokens_dropped(&self) -> u64 {
        self.tokens_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple_line() {
        assert_eq!(encode_line("a,b"), "97 44 98 13 10");
    }

    #[test]
    fn test_decode_tokens_strips_terminator() {
        assert_eq!(decode_tokens("97 44 98 13 10"), "a,b");
    }

    #[test]
    fn test_decode_tokens_skips_malformed() {
        assert_eq!(decode_tokens("97 xx 98 13 10"), "ab");
    }

    #[test]
    fn test_first_terminator_is_noop() {
        let mut decoder = FrameDecoder::new();

        assert_eq!(decoder.push("13 10"), None);
        assert!(decoder.terminator_pending());

        // Second terminator with nothing accumulated yields an empty line.
        assert_eq!(decoder.push("13 10"), Some(String::new()));
        assert!(!decoder.terminator_pending());
        assert_eq!(decoder.frames_emitted(), 1);
    }

    #[test]
    fn test_roundtrip_after_priming() {
        let line = "Total runtime,FW ver,Dev ID,Type,inputs,state,Sensor1,Sensor2,\
                    2021-01-01T00:00:00,V001,0,Sensor,8,Active,42,7";
        let mut decoder = FrameDecoder::new();

        // First frame is consumed by the pending-terminator no-op.
        assert_eq!(decoder.push(&encode_line(line)), None);
        assert_eq!(decoder.push(&encode_line(line)), Some(line.to_string()));
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let mut decoder = FrameDecoder::new();
        let stream = format!("{} {}", encode_line("a,b"), encode_line("x,y"));

        let mut lines = Vec::new();
        for ch in stream.chars() {
            if let Some(line) = decoder.push(&ch.to_string()) {
                lines.push(line);
            }
        }

        // One frame lost to priming, one emitted.
        assert_eq!(lines, vec!["x,y".to_string()]);
    }

    #[test]
    fn test_raw_frame_keeps_tokens() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push_raw("13 10"), None);
        assert_eq!(
            decoder.push_raw("97 44 98 13 10"),
            Some("97 44 98 13 10".to_string())
        );
    }

    #[test]
    fn test_malformed_tokens_counted() {
        let mut decoder = FrameDecoder::new();
        decoder.push("13 10");
        let line = decoder.push("97 zz 98 13 10");
        assert_eq!(line, Some("ab".to_string()));
        assert_eq!(decoder.tokens_dropped(), 1);
    }
}

//! Incremental UTF-8 decoder for byte-level token pieces
//!
//! A runtime hands back raw bytes per token, and a multi-byte character can be
//! split across two or more tokens. The decoder keeps the incomplete tail of
//! the byte stream and only releases text once it forms whole characters.

/// Incremental decoder that accumulates per-token byte pieces into text.
#[derive(Debug, Clone, Default)]
pub struct IncrementalUtf8Decoder {
    /// The complete decoded text so far
    decoded_text: String,

    /// Bytes of an incomplete trailing character
    pending: Vec<u8>,
}

impl IncrementalUtf8Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the bytes of one token, returning only the newly completed text.
    ///
    /// Returns an empty string when the piece ends in the middle of a
    /// character; the held-back bytes are emitted with the next piece that
    /// completes them. Byte sequences that can never become valid UTF-8 are
    /// replaced with U+FFFD.
    pub fn push_bytes(&mut self, piece: &[u8]) -> String {
        self.pending.extend_from_slice(piece);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }

        self.decoded_text.push_str(&out);
        out
    }

    /// Emit whatever is still held back, lossily.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        self.decoded_text.push_str(&tail);
        tail
    }

    /// Get the complete decoded text
    pub fn get_text(&self) -> &str {
        &self.decoded_text
    }

    /// Whether bytes of an unfinished character are being held back
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

// src/stream/decoder.rs
use std::str;

/// Incremental UTF-8 decoder for the event-stream read loop.
///
/// Network chunks are not aligned to character boundaries, so a multi-byte
/// scalar can arrive split across two reads. The decoder keeps the trailing
/// incomplete byte sequence of each chunk and prepends it to the next one
/// instead of treating chunk boundaries as decoding boundaries.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one chunk, returning all text that is complete so far.
    ///
    /// An incomplete sequence at the end of the chunk is held back for the
    /// next call. A sequence that is invalid outright decodes to U+FFFD so a
    /// corrupt byte cannot wedge the stream.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let bytes: Vec<u8> = if self.carry.is_empty() {
            chunk.to_vec()
        } else {
            let mut joined = std::mem::take(&mut self.carry);
            joined.extend_from_slice(chunk);
            joined
        };

        let mut out = String::with_capacity(bytes.len());
        let mut rest = &bytes[..];
        loop {
            match str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    // Valid prefix is guaranteed UTF-8 by the error.
                    out.push_str(str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + bad..];
                        }
                        None => {
                            // Incomplete tail, wait for the next chunk.
                            self.carry = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// True when bytes are still waiting for the rest of their sequence.
    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_ascii() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"data: hello\n"), "data: hello\n");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn carries_split_multibyte_character() {
        // "Olá!" with the two-byte 'á' (0xC3 0xA1) split across chunks.
        let bytes = "Olá!".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let first = decoder.decode(&bytes[..3]);
        assert_eq!(first, "Ol");
        assert!(decoder.has_pending());
        let second = decoder.decode(&bytes[3..]);
        assert_eq!(second, "á!");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn carries_across_three_chunks() {
        // Four-byte emoji delivered one byte at a time.
        let bytes = "🙂".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, "🙂");
    }

    #[test]
    fn invalid_byte_becomes_replacement_character() {
        let mut decoder = Utf8Decoder::new();
        let out = decoder.decode(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
        assert!(!decoder.has_pending());
    }
}

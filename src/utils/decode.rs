//! Best-effort decoding of raw byte spans into text.
//!
//! Tablature files written by different locales of the authoring tool store header strings in
//! whatever the host code page was. There is no marker telling which one, so decoding is an
//! ordered list of attempts where the first one that succeeds wins. The last strategy
//! (Latin-1) is total, so decoding never fails.

use encoding::{DecoderTrap, EncodingRef};
use log::trace;
use std::fmt;

/// A single decoding attempt.
#[derive(Clone, Copy)]
pub enum DecodeStrategy {
    /// Strict UTF-8, rejected on any invalid sequence or a replacement character.
    Utf8,
    /// A legacy (usually multi-byte East-Asian) code page, rejected on any decoding error or an
    /// empty result.
    Legacy(EncodingRef),
    /// Byte-for-byte mapping to U+0000..U+00FF. Never fails.
    Latin1,
}

impl DecodeStrategy {
    /// Try to decode `bytes`, returning `None` if this strategy does not apply.
    pub fn attempt(&self, bytes: &[u8]) -> Option<String> {
        match self {
            DecodeStrategy::Utf8 => std::str::from_utf8(bytes)
                .ok()
                .filter(|s| !s.contains(char::REPLACEMENT_CHARACTER))
                .map(str::to_owned),
            DecodeStrategy::Legacy(codec) => match codec.decode(bytes, DecoderTrap::Strict) {
                Ok(s) if !s.is_empty() => Some(s),
                _ => None,
            },
            DecodeStrategy::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DecodeStrategy::Utf8 => "utf-8",
            DecodeStrategy::Legacy(codec) => codec.name(),
            DecodeStrategy::Latin1 => "latin-1",
        }
    }
}

impl fmt::Debug for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered chain of [`DecodeStrategy`], evaluated left to right.
#[derive(Clone, Copy, Debug)]
pub struct StringDecoder {
    strategies: [DecodeStrategy; 3],
}

impl Default for StringDecoder {
    fn default() -> Self {
        StringDecoder::with_legacy_codec(encoding::all::GBK)
    }
}

impl StringDecoder {
    /// UTF-8, then `codec`, then Latin-1.
    pub fn with_legacy_codec(codec: EncodingRef) -> Self {
        StringDecoder {
            strategies: [
                DecodeStrategy::Utf8,
                DecodeStrategy::Legacy(codec),
                DecodeStrategy::Latin1,
            ],
        }
    }

    pub fn strategies(&self) -> &[DecodeStrategy] {
        &self.strategies
    }

    /// Decode `bytes`, ignoring trailing NUL padding.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let bytes = &bytes[..end];
        if bytes.is_empty() {
            return String::new();
        }

        for strategy in &self.strategies {
            if let Some(s) = strategy.attempt(bytes) {
                trace!("decoded {} bytes as {}", bytes.len(), strategy.name());
                return s;
            }
        }

        // Unreachable while the chain ends with `Latin1`.
        DecodeStrategy::Latin1.attempt(bytes).unwrap_or_default()
    }
}

/// Decode `bytes` with the default chain (UTF-8, GBK, Latin-1).
pub fn decode_string(bytes: &[u8]) -> String {
    StringDecoder::default().decode(bytes)
}

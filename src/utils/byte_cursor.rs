use crate::utils::bytes;
use crate::utils::decode::StringDecoder;
use log::trace;

/// Default upper bound (inclusive) for length-prefixed string sizes.
pub(crate) const DEFAULT_MAX_STRING_LEN: usize = 10_000;

/// A lenient cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`, specialized for header formats that
/// are routinely truncated or hand-edited:
/// - reads never fail; reading past the end yields a zero value and leaves the cursor at EOF,
/// - seeks and skips are clamped to the buffer length,
/// - string reads validate their length prefix and skip corrupt fields instead of erroring.
///
/// All numeric reads are little-endian and advance the cursor.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    decoder: StringDecoder,
    max_string_len: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        ByteCursor {
            buf,
            pos: 0,
            decoder: StringDecoder::default(),
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }

    pub(crate) fn with_decoder(mut self, decoder: StringDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub(crate) fn with_max_string_len(mut self, max_string_len: usize) -> Self {
        self.max_string_len = max_string_len;
        self
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Move to an absolute position, clamped to the end of the buffer.
    pub(crate) fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    /// Move forward by `n` bytes, clamped to the end of the buffer.
    pub(crate) fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.buf.len());
    }

    /// Take up to `len` bytes; fewer are returned when the buffer runs out.
    pub(crate) fn take_bytes(&mut self, len: usize) -> &'a [u8] {
        let end = self.pos.saturating_add(len).min(self.buf.len());
        let out = &self.buf[self.pos..end];
        self.pos = end;
        out
    }

    pub(crate) fn u8(&mut self) -> u8 {
        match self.buf.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                b
            }
            None => 0,
        }
    }

    pub(crate) fn i32(&mut self) -> i32 {
        match bytes::read_i32_le(self.buf, self.pos) {
            Some(v) => {
                self.pos += 4;
                v
            }
            None => {
                self.seek(self.buf.len());
                0
            }
        }
    }

    pub(crate) fn u32(&mut self) -> u32 {
        match bytes::read_u32_le(self.buf, self.pos) {
            Some(v) => {
                self.pos += 4;
                v
            }
            None => {
                self.seek(self.buf.len());
                0
            }
        }
    }

    /// Decode a byte span with this cursor's string decoder.
    pub(crate) fn decode(&self, raw: &[u8]) -> String {
        self.decoder.decode(raw)
    }

    /// Validate a length prefix against `(0, max_string_len]` and the remaining buffer.
    fn valid_len(&self, len: i32) -> Option<usize> {
        let len = usize::try_from(len).ok().filter(|&l| l > 0)?;
        (len <= self.max_string_len && len <= self.remaining()).then_some(len)
    }

    /// Skip the (bounded) body of a field whose prefix failed validation.
    fn skip_corrupt(&mut self, len: i32, what: &'static str) -> String {
        trace!(
            "Offset `0x{offset:08x} ({offset})`: corrupt {what} (len {len}), skipping",
            offset = self.pos,
        );
        if let Ok(len) = usize::try_from(len) {
            self.skip(len);
        }
        String::new()
    }

    /// Read a 4-byte length followed by that many bytes.
    pub(crate) fn len_prefixed_string(&mut self) -> String {
        let len = self.i32();
        match self.valid_len(len) {
            Some(len) => {
                let raw = self.take_bytes(len);
                self.decode(raw)
            }
            None => self.skip_corrupt(len, "length-prefixed string"),
        }
    }

    /// Read a 4-byte total length, a 1-byte string length, the string bytes and then
    /// `total - 1 - string length` bytes of padding.
    pub(crate) fn double_prefixed_string(&mut self) -> String {
        let total = self.i32();
        let Some(total_len) = self.valid_len(total) else {
            return self.skip_corrupt(total, "double-prefixed string");
        };

        let actual = usize::from(self.u8());
        let body = total_len - 1;
        if actual > body {
            return self.skip_corrupt(body as i32, "double-prefixed string body");
        }

        let raw = self.take_bytes(actual);
        self.skip(body - actual);
        self.decode(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn double_prefixed(s: &str, total: i32) -> Vec<u8> {
        let mut out = total.to_le_bytes().to_vec();
        out.push(s.len() as u8);
        out.extend_from_slice(s.as_bytes());
        let padding = total as usize - 1 - s.len();
        out.extend(std::iter::repeat_n(0u8, padding));
        out
    }

    #[test]
    fn test_reads_past_end_return_defaults() {
        let buf = [0x01, 0x02];
        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.i32(), 0);
        assert!(cursor.is_eof());
        assert_eq!(cursor.u8(), 0);
        assert_eq!(cursor.take_bytes(10), &[] as &[u8]);
        assert_eq!(cursor.pos(), 2);
    }

    #[test]
    fn test_u32_reads_and_clamps_at_end() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03];
        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.u32(), u32::MAX);
        assert_eq!(cursor.pos(), 4);
        assert_eq!(cursor.u32(), 0);
        assert!(cursor.is_eof());
        assert_eq!(cursor.pos(), 7);
    }

    #[test]
    fn test_seek_and_skip_are_clamped() {
        let buf = [0u8; 8];
        let mut cursor = ByteCursor::new(&buf);
        cursor.skip(3);
        assert_eq!(cursor.pos(), 3);
        cursor.skip(usize::MAX);
        assert_eq!(cursor.pos(), 8);
        cursor.seek(1);
        assert_eq!(cursor.remaining(), 7);
        cursor.seek(100);
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_reads_double_prefixed_string_with_padding() {
        let mut buf = double_prefixed("Song", 41);
        buf.extend_from_slice(&7i32.to_le_bytes());

        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.double_prefixed_string(), "Song");
        assert_eq!(cursor.pos(), 45);
        assert_eq!(cursor.i32(), 7);
    }

    #[test]
    fn test_double_prefixed_string_longer_than_buffer_consumes_rest() {
        let mut buf = 500i32.to_le_bytes().to_vec();
        buf.extend_from_slice(&[3, b'a', b'b', b'c']);

        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.double_prefixed_string(), "");
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_double_prefixed_string_with_inconsistent_lengths_is_skipped() {
        // Total of 3 leaves room for 2 characters, but 9 are claimed.
        let mut buf = 3i32.to_le_bytes().to_vec();
        buf.extend_from_slice(&[9, b'x', b'y']);
        buf.extend_from_slice(&42i32.to_le_bytes());

        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.double_prefixed_string(), "");
        assert_eq!(cursor.i32(), 42);
    }

    #[test]
    fn test_empty_double_prefixed_string() {
        let buf = double_prefixed("", 1);
        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.double_prefixed_string(), "");
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_reads_len_prefixed_string() {
        let mut buf = 5i32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"Verse");
        let mut cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.len_prefixed_string(), "Verse");
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_len_prefixed_string_rejects_bad_lengths() {
        let mut buf = (-4i32).to_le_bytes().to_vec();
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&9i32.to_le_bytes());
        buf.extend_from_slice(b"abc");

        let mut cursor = ByteCursor::new(&buf);
        // Negative: nothing to skip.
        assert_eq!(cursor.len_prefixed_string(), "");
        assert_eq!(cursor.pos(), 4);
        // Zero: empty.
        assert_eq!(cursor.len_prefixed_string(), "");
        assert_eq!(cursor.pos(), 8);
        // Longer than what is left: skip what remains.
        assert_eq!(cursor.len_prefixed_string(), "");
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_max_string_len_is_enforced() {
        let mut buf = 6i32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"abcdef");
        let mut cursor = ByteCursor::new(&buf).with_max_string_len(4);
        assert_eq!(cursor.len_prefixed_string(), "");
        assert!(cursor.is_eof());
    }
}

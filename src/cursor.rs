//! Zero-copy byte cursor over a file's memory image.
//!
//! All delimiter searches are bytewise, not UTF-aware — a VCD trace is not
//! guaranteed to be valid UTF-8 inside signal payloads, and there is no
//! reason to pay for a UTF-8 scan here.

use crate::error::{malformed, Error};

/// A cursor over `buffer[offset..]`. Never copies `buffer`; every `take_*`
/// call that needs owned bytes allocates only that result.
#[derive(Clone)]
pub struct Cursor<'input> {
    buffer: &'input [u8],
    offset: usize,
}

impl<'input> Cursor<'input> {
    #[must_use]
    pub fn new(buffer: &'input [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    #[must_use]
    fn remaining(&self) -> &'input [u8] {
        &self.buffer[self.offset..]
    }

    /// If the remaining bytes begin with `keyword`, advances past it and
    /// returns `true`. Otherwise leaves the cursor untouched.
    pub fn try_consume(&mut self, keyword: &[u8]) -> bool {
        if self.remaining().starts_with(keyword) {
            self.offset += keyword.len();
            true
        } else {
            false
        }
    }

    /// Number of bytes between the cursor and the first occurrence of
    /// `delim`. Fails with `MalformedTrace` if `delim` does not occur again.
    pub fn distance_to(&self, delim: &[u8]) -> Result<usize, Error> {
        find_subslice(self.remaining(), delim).ok_or_else(|| {
            malformed(
                self.offset,
                format!("expected to find {:?} before end of file", String::from_utf8_lossy(delim)),
            )
        })
    }

    /// Copies `[p, p+distance_to(delim))` and advances the cursor over it
    /// (not over `delim` itself).
    pub fn take_until(&mut self, delim: &[u8]) -> Result<Vec<u8>, Error> {
        let len = self.distance_to(delim)?;
        let bytes = self.remaining()[..len].to_vec();
        self.offset += len;
        Ok(bytes)
    }

    /// Advances to and over the next occurrence of the literal `$end\n`.
    pub fn skip_past_end_marker(&mut self) -> Result<(), Error> {
        const MARKER: &[u8] = b"$end\n";
        let len = self.distance_to(MARKER)?;
        self.offset += len + MARKER.len();
        Ok(())
    }

    /// Reads and advances past a single byte, or `None` at EOF.
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.remaining().first()?;
        self.offset += 1;
        Some(byte)
    }

    /// Advances the cursor by `n` bytes without inspecting them.
    pub fn advance(&mut self, n: usize) {
        self.offset += n;
    }

    /// Copies exactly `n` bytes and advances past them.
    pub fn take_fixed(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        if self.remaining().len() < n {
            return Err(malformed(self.offset, "unexpected end of file"));
        }
        let bytes = self.remaining()[..n].to_vec();
        self.offset += n;
        Ok(bytes)
    }

    /// Consumes a decimal number, advancing to the first non-digit byte.
    pub fn parse_unsigned_decimal(&mut self) -> Result<u64, Error> {
        let start = self.offset;
        let digits = self.take_digit_run();
        if digits == 0 {
            return Err(malformed(start, "expected a decimal number"));
        }
        let text = std::str::from_utf8(&self.buffer[start..self.offset]).unwrap();
        text.parse()
            .map_err(|_| malformed(start, format!("decimal number `{text}` overflows u64")))
    }

    /// Consumes an optionally `-`-prefixed decimal number, advancing to the
    /// first non-digit byte.
    pub fn parse_signed_decimal(&mut self) -> Result<i64, Error> {
        let start = self.offset;
        if self.remaining().first() == Some(&b'-') {
            self.offset += 1;
        }
        let digits = self.take_digit_run();
        if digits == 0 {
            self.offset = start;
            return Err(malformed(start, "expected a decimal number"));
        }
        let text = std::str::from_utf8(&self.buffer[start..self.offset]).unwrap();
        text.parse()
            .map_err(|_| malformed(start, format!("decimal number `{text}` overflows i64")))
    }

    /// Advances past a contiguous run of ASCII digits, returning how many
    /// were consumed.
    fn take_digit_run(&mut self) -> usize {
        let count = self
            .remaining()
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        self.offset += count;
        count
    }
}

/// Byte-wise substring search (no UTF-8 assumptions, no external dependency
/// for something this small).
fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

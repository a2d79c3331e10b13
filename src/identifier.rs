//! Identifier code codec.
//!
//! A VCD identifier code is a short, printable byte run. The overwhelming
//! majority of real traces use codes of 8 bytes or fewer, so those are
//! packed into a `u64` and compared/hashed as an integer; longer codes fall
//! back to an owned byte sequence. This split is the bulk of this crate's
//! throughput over the naive "always a `Vec<u8>` key" design.

use std::hash::{Hash, Hasher};

use crate::error::{malformed, Error};

/// A tagged identifier key: a packed integer for short codes, an owned byte
/// sequence for everything else.
#[derive(Debug, Clone, Eq)]
pub enum IdentifierCode {
    /// `bytes` packed little-endian into the low-order bytes of the word,
    /// plus the original byte count so decoding is exact even though the
    /// high bytes are zero-padded.
    Packed(u64, u8),
    Owned(Box<[u8]>),
}

impl IdentifierCode {
    /// Encodes `bytes` as an identifier code. Fails with `MalformedTrace`
    /// only if `bytes` is empty.
    pub fn encode(bytes: &[u8]) -> Result<Self, Error> {
        Self::encode_at(bytes, 0)
    }

    /// Like [`encode`](Self::encode), but reports `offset` in the error so
    /// callers inside a cursor-driven parse can surface the failing byte
    /// position.
    pub fn encode_at(bytes: &[u8], offset: usize) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(malformed(offset, "empty identifier code"));
        }
        if bytes.len() <= 8 {
            let mut word = 0u64;
            for (i, &b) in bytes.iter().enumerate() {
                word |= (b as u64) << (8 * i);
            }
            Ok(Self::Packed(word, bytes.len() as u8))
        } else {
            Ok(Self::Owned(bytes.to_vec().into_boxed_slice()))
        }
    }

    /// Recovers the exact bytes this code was built from.
    #[must_use]
    pub fn decoded_bytes(&self) -> Vec<u8> {
        match self {
            Self::Packed(word, len) => (0..*len).map(|i| (word >> (8 * i)) as u8).collect(),
            Self::Owned(bytes) => bytes.to_vec(),
        }
    }
}

impl PartialEq for IdentifierCode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Packed(a, la), Self::Packed(b, lb)) => a == b && la == lb,
            (Self::Owned(a), Self::Owned(b)) => a == b,
            _ => false,
        }
    }
}

impl Hash for IdentifierCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Packed(word, len) => {
                state.write_u8(0);
                state.write_u64(*word);
                state.write_u8(*len);
            }
            Self::Owned(bytes) => {
                state.write_u8(1);
                bytes.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_codes_pack_into_an_integer() {
        let code = IdentifierCode::encode(b"!").unwrap();
        assert_eq!(code, IdentifierCode::Packed(0x21, 1));
    }

    #[test]
    fn long_codes_stay_owned() {
        let code = IdentifierCode::encode(b"abcdefghi").unwrap();
        assert!(matches!(code, IdentifierCode::Owned(_)));
    }

    #[test]
    fn round_trips_through_decoded_bytes() {
        for sample in [&b"!"[..], b"ab", b"abcdefgh", b"abcdefghi", b"a very long identifier"] {
            let code = IdentifierCode::encode(sample).unwrap();
            assert_eq!(code.decoded_bytes(), sample);
        }
    }

    #[test]
    fn empty_bytes_are_malformed() {
        assert!(matches!(
            IdentifierCode::encode(b""),
            Err(Error::MalformedTrace { .. })
        ));
    }

    #[test]
    fn packed_codes_with_same_content_are_equal() {
        let a = IdentifierCode::encode(b"!").unwrap();
        let b = IdentifierCode::encode(b"!").unwrap();
        assert_eq!(a, b);
    }
}

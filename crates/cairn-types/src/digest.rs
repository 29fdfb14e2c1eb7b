use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for any object in a Cairn repository.
///
/// A `Digest` is the BLAKE3 hash of an object's content. Identical content
/// always produces the same `Digest`. Equality is byte equality and ordering
/// is lexicographic over the raw bytes, so sets of digests iterate in a
/// stable order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Length of a digest in bytes.
    pub const LEN: usize = 32;

    /// Compute a `Digest` from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a `Digest` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Interpret a byte slice as a raw digest.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The null digest (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the null digest.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The byte at position `index`, the pin-set trie key at that depth.
    ///
    /// Returns `None` past the end of the digest.
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; 32] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_bytes_is_deterministic() {
        let data = b"hello world";
        assert_eq!(Digest::from_bytes(data), Digest::from_bytes(data));
    }

    #[test]
    fn different_data_produces_different_digests() {
        assert_ne!(Digest::from_bytes(b"hello"), Digest::from_bytes(b"world"));
    }

    #[test]
    fn null_is_all_zeros() {
        let null = Digest::null();
        assert!(null.is_null());
        assert_eq!(null.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(Digest::from_bytes(b"test").short_hex().len(), 8);
    }

    #[test]
    fn display_is_full_hex() {
        let d = Digest::from_bytes(b"test");
        let display = format!("{d}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, d.to_hex());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn parse_rejects_non_hex() {
        let err = "zz".parse::<Digest>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let d = Digest::from_bytes(b"padded");
        let parsed: Digest = format!("  {d}\n").parse().unwrap();
        assert_eq!(parsed, d);
    }

    #[test]
    fn byte_at_walks_prefix() {
        let mut raw = [0u8; 32];
        raw[0] = 0xab;
        raw[31] = 0x01;
        let d = Digest::from_hash(raw);
        assert_eq!(d.byte_at(0), Some(0xab));
        assert_eq!(d.byte_at(31), Some(0x01));
        assert_eq!(d.byte_at(32), None);
    }

    #[test]
    fn ordering_follows_bytes() {
        assert!(Digest::from_hash([0; 32]) < Digest::from_hash([1; 32]));
    }

    #[test]
    fn serde_json_form_is_stable() {
        let d = Digest::from_bytes(b"serde test");
        let json = serde_json::to_string(&d).unwrap();
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(d, parsed);
    }

    proptest! {
        #[test]
        fn hex_parses_back(raw in any::<[u8; 32]>()) {
            let d = Digest::from_hash(raw);
            prop_assert_eq!(Digest::from_hex(&d.to_hex()).unwrap(), d);
        }
    }
}

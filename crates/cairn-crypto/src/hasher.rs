use cairn_types::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"cairn-node-v1"`) that is
/// prepended to every hash computation. A user data node and a pin-set node
/// with identical bytes therefore produce different digests.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for user content nodes.
    pub const NODE: Self = Self {
        domain: "cairn-node-v1",
    };
    /// Hasher for pin-set structure nodes.
    pub const PIN_SET: Self = Self {
        domain: "cairn-pinset-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        self.hash_parts(&[data])
    }

    /// Hash a sequence of byte parts as one message with domain separation.
    ///
    /// Parts are fed to the hasher back to back; callers that need an
    /// unambiguous split must length-prefix their parts.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        Digest::from_hash(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::NODE.hash(data), ContentHasher::NODE.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        assert_ne!(
            ContentHasher::NODE.hash(data),
            ContentHasher::PIN_SET.hash(data)
        );
    }

    #[test]
    fn parts_hash_like_concatenation() {
        let whole = ContentHasher::NODE.hash(b"abcdef");
        let split = ContentHasher::NODE.hash_parts(&[b"abc", b"def"]);
        assert_eq!(whole, split);
    }

    #[test]
    fn domain_tag_is_mixed_in() {
        assert_ne!(
            *ContentHasher::NODE.hash(b"test").as_bytes(),
            *blake3::hash(b"test").as_bytes()
        );
    }
}

//! Content-addressed encoding of a pin set.
//!
//! A pin set is stored as a small DAG of [`NodeKind::PinSet`] nodes rather
//! than one blob:
//!
//! ```text
//! header { version, recursive_count, direct_count }
//!   links[0] -> recursive trie root
//!   links[1] -> direct trie root
//! ```
//!
//! Each trie is keyed by digest prefix, one byte per level. A node holding
//! at most `max_items` members is a leaf carrying them in its payload.
//! Larger member lists become a bucket that partitions them by the byte at
//! its depth; only non-empty slots are stored, so a bucket has at most 256
//! links. Members live in payloads, never in links, so walking the pin set
//! never wanders into pinned content.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cairn_store::{DagNode, NodeKind, ObjectStore};
use cairn_types::Digest;

use crate::error::{PinError, PinResult};

/// Format version written into every header.
pub const PIN_SET_VERSION: u32 = 1;

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
enum PinSetNode {
    Header {
        version: u32,
        recursive_count: u64,
        direct_count: u64,
    },
    Leaf {
        depth: u8,
        members: Vec<Digest>,
    },
    Bucket {
        depth: u8,
        /// Prefix byte of each link, ascending.
        slots: Vec<u8>,
    },
}

/// Result of [`PinSetCodec::serialize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPinSet {
    /// Digest of the header node.
    pub root: Digest,
    /// Every node of the encoding, header included.
    pub internal: BTreeSet<Digest>,
}

/// Result of [`PinSetCodec::deserialize`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedPinSet {
    pub direct: BTreeSet<Digest>,
    pub recursive: BTreeSet<Digest>,
    /// Every node visited while decoding, header included.
    pub internal: BTreeSet<Digest>,
}

/// Writes and reads pin sets through an object store.
#[derive(Clone)]
pub struct PinSetCodec {
    store: Arc<dyn ObjectStore>,
    max_items: usize,
}

impl std::fmt::Debug for PinSetCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinSetCodec")
            .field("max_items", &self.max_items)
            .finish_non_exhaustive()
    }
}

fn corrupt(reason: impl Into<String>) -> PinError {
    PinError::CorruptPinSet(reason.into())
}

fn encode(node: &PinSetNode) -> PinResult<Vec<u8>> {
    bincode::serialize(node).map_err(|e| PinError::Serialization(e.to_string()))
}

impl PinSetCodec {
    /// Codec splitting trie nodes above `max_items` members (minimum 1).
    pub fn new(store: Arc<dyn ObjectStore>, max_items: usize) -> Self {
        Self {
            store,
            max_items: max_items.max(1),
        }
    }

    /// Store both sets and return the digest of the header node.
    pub async fn serialize(
        &self,
        direct: &BTreeSet<Digest>,
        recursive: &BTreeSet<Digest>,
    ) -> PinResult<EncodedPinSet> {
        let mut nodes = Vec::new();

        let recursive_members: Vec<Digest> = recursive.iter().copied().collect();
        let direct_members: Vec<Digest> = direct.iter().copied().collect();
        let recursive_root = self.encode_trie(&recursive_members, 0, &mut nodes)?;
        let direct_root = self.encode_trie(&direct_members, 0, &mut nodes)?;

        let header = PinSetNode::Header {
            version: PIN_SET_VERSION,
            recursive_count: recursive.len() as u64,
            direct_count: direct.len() as u64,
        };
        nodes.push(DagNode::new(
            NodeKind::PinSet,
            encode(&header)?,
            vec![recursive_root, direct_root],
        ));

        let digests = self.store.put_many(&nodes).await?;
        let root = *digests
            .last()
            .ok_or_else(|| PinError::Serialization("empty pin set encoding".into()))?;
        debug!(
            root = %root.short_hex(),
            nodes = digests.len(),
            direct = direct.len(),
            recursive = recursive.len(),
            "encoded pin set"
        );
        Ok(EncodedPinSet {
            root,
            internal: digests.into_iter().collect(),
        })
    }

    /// Build the trie for `members` (sorted, distinct) below `depth`.
    ///
    /// Nodes are appended to `out` children first.
    fn encode_trie(
        &self,
        members: &[Digest],
        depth: usize,
        out: &mut Vec<DagNode>,
    ) -> PinResult<Digest> {
        let node = if members.len() <= self.max_items || depth >= Digest::LEN {
            let leaf = PinSetNode::Leaf {
                depth: depth as u8,
                members: members.to_vec(),
            };
            DagNode::new(NodeKind::PinSet, encode(&leaf)?, Vec::new())
        } else {
            let mut slots = Vec::new();
            let mut links = Vec::new();
            for group in members.chunk_by(|a, b| a.byte_at(depth) == b.byte_at(depth)) {
                let slot = group[0].byte_at(depth).ok_or_else(|| {
                    PinError::Serialization(format!("no trie slot at depth {depth}"))
                })?;
                slots.push(slot);
                links.push(self.encode_trie(group, depth + 1, out)?);
            }
            let bucket = PinSetNode::Bucket {
                depth: depth as u8,
                slots,
            };
            DagNode::new(NodeKind::PinSet, encode(&bucket)?, links)
        };
        let digest = node.digest();
        out.push(node);
        Ok(digest)
    }

    /// Read both sets back from the header node at `root`.
    pub async fn deserialize(&self, root: Digest) -> PinResult<DecodedPinSet> {
        let mut decoded = DecodedPinSet::default();

        let header_node = self.fetch(&root).await?;
        decoded.internal.insert(root);
        let (recursive_count, direct_count) = match decode(&root, &header_node)? {
            PinSetNode::Header {
                version,
                recursive_count,
                direct_count,
            } => {
                if version != PIN_SET_VERSION {
                    return Err(corrupt(format!(
                        "unsupported pin set version {version} at {root}"
                    )));
                }
                (recursive_count, direct_count)
            }
            _ => return Err(corrupt(format!("{root} is not a pin set header"))),
        };
        let &[recursive_root, direct_root] = &header_node.links[..] else {
            return Err(corrupt(format!(
                "pin set header {root} has {} links, expected 2",
                header_node.links.len()
            )));
        };

        self.decode_trie(recursive_root, &mut decoded.recursive, &mut decoded.internal)
            .await?;
        self.decode_trie(direct_root, &mut decoded.direct, &mut decoded.internal)
            .await?;

        if decoded.recursive.len() as u64 != recursive_count
            || decoded.direct.len() as u64 != direct_count
        {
            return Err(corrupt(format!(
                "pin set {root} member counts do not match its header"
            )));
        }
        if let Some(both) = decoded.recursive.intersection(&decoded.direct).next() {
            return Err(corrupt(format!(
                "{both} is recorded as both a recursive and a direct pin"
            )));
        }

        debug!(
            root = %root.short_hex(),
            nodes = decoded.internal.len(),
            direct = decoded.direct.len(),
            recursive = decoded.recursive.len(),
            "decoded pin set"
        );
        Ok(decoded)
    }

    async fn decode_trie(
        &self,
        root: Digest,
        members: &mut BTreeSet<Digest>,
        internal: &mut BTreeSet<Digest>,
    ) -> PinResult<()> {
        // Depth grows by one per level and is capped, so this terminates
        // even on a hostile structure.
        let mut pending: Vec<(Digest, usize, Vec<u8>)> = vec![(root, 0, Vec::new())];
        let mut seen = HashSet::new();

        while let Some((digest, expected_depth, prefix)) = pending.pop() {
            if !seen.insert(digest) {
                return Err(corrupt(format!("pin set node {digest} is linked twice")));
            }
            let node = self.fetch(&digest).await?;
            internal.insert(digest);

            match decode(&digest, &node)? {
                PinSetNode::Leaf { depth, members: leaf } => {
                    check_depth(&digest, depth, expected_depth)?;
                    if !node.links.is_empty() {
                        return Err(corrupt(format!("pin set leaf {digest} has links")));
                    }
                    for member in leaf {
                        if !member.as_bytes().starts_with(&prefix) {
                            return Err(corrupt(format!(
                                "{member} is stored under the wrong prefix in {digest}"
                            )));
                        }
                        if !members.insert(member) {
                            return Err(corrupt(format!("{member} is recorded twice")));
                        }
                    }
                }
                PinSetNode::Bucket { depth, slots } => {
                    check_depth(&digest, depth, expected_depth)?;
                    if expected_depth >= Digest::LEN {
                        return Err(corrupt(format!("pin set bucket {digest} is too deep")));
                    }
                    if slots.len() != node.links.len() || slots.windows(2).any(|w| w[0] >= w[1]) {
                        return Err(corrupt(format!("pin set bucket {digest} has bad slots")));
                    }
                    for (slot, link) in slots.iter().zip(&node.links) {
                        let mut child_prefix = prefix.clone();
                        child_prefix.push(*slot);
                        pending.push((*link, expected_depth + 1, child_prefix));
                    }
                }
                PinSetNode::Header { .. } => {
                    return Err(corrupt(format!("unexpected pin set header at {digest}")));
                }
            }
        }
        Ok(())
    }

    async fn fetch(&self, digest: &Digest) -> PinResult<DagNode> {
        self.store
            .get(digest)
            .await?
            .ok_or_else(|| corrupt(format!("pin set node {digest} is missing")))
    }
}

fn decode(digest: &Digest, node: &DagNode) -> PinResult<PinSetNode> {
    if node.kind != NodeKind::PinSet {
        return Err(corrupt(format!("{digest} is a {} node, not a pin set node", node.kind)));
    }
    bincode::deserialize(&node.data)
        .map_err(|e| corrupt(format!("pin set node {digest} failed to decode: {e}")))
}

fn check_depth(digest: &Digest, depth: u8, expected: usize) -> PinResult<()> {
    if usize::from(depth) != expected {
        return Err(corrupt(format!(
            "pin set node {digest} claims depth {depth}, expected {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::InMemoryObjectStore;
    use proptest::prelude::*;

    fn digests(n: usize, tag: &str) -> BTreeSet<Digest> {
        (0..n)
            .map(|i| Digest::from_bytes(format!("{tag}-{i}").as_bytes()))
            .collect()
    }

    fn codec(max_items: usize) -> (Arc<InMemoryObjectStore>, PinSetCodec) {
        let store = Arc::new(InMemoryObjectStore::new());
        let codec = PinSetCodec::new(store.clone(), max_items);
        (store, codec)
    }

    #[tokio::test]
    async fn empty_sets_round_trip() {
        let (_, codec) = codec(8);
        let encoded = codec
            .serialize(&BTreeSet::new(), &BTreeSet::new())
            .await
            .unwrap();
        let decoded = codec.deserialize(encoded.root).await.unwrap();
        assert!(decoded.direct.is_empty());
        assert!(decoded.recursive.is_empty());
        assert_eq!(decoded.internal, encoded.internal);
    }

    #[tokio::test]
    async fn groups_come_back_separately() {
        let (_, codec) = codec(8);
        let direct = digests(3, "direct");
        let recursive = digests(5, "recursive");
        let encoded = codec.serialize(&direct, &recursive).await.unwrap();
        let decoded = codec.deserialize(encoded.root).await.unwrap();
        assert_eq!(decoded.direct, direct);
        assert_eq!(decoded.recursive, recursive);
    }

    #[tokio::test]
    async fn large_sets_are_sharded_into_bounded_nodes() {
        let (store, codec) = codec(4);
        let recursive = digests(200, "r");
        let encoded = codec.serialize(&BTreeSet::new(), &recursive).await.unwrap();

        // header + empty direct leaf + a multi-level recursive trie
        assert!(encoded.internal.len() > 3);
        for digest in &encoded.internal {
            let node = store.get(digest).await.unwrap().unwrap();
            assert_eq!(node.kind, NodeKind::PinSet);
            match bincode::deserialize::<PinSetNode>(&node.data).unwrap() {
                PinSetNode::Leaf { members, .. } => assert!(members.len() <= 4),
                PinSetNode::Bucket { slots, .. } => assert!(slots.len() <= 256),
                PinSetNode::Header { .. } => assert_eq!(*digest, encoded.root),
            }
        }

        let decoded = codec.deserialize(encoded.root).await.unwrap();
        assert_eq!(decoded.recursive, recursive);
        assert_eq!(decoded.internal, encoded.internal);
    }

    #[tokio::test]
    async fn encoding_is_deterministic() {
        let (_, codec) = codec(2);
        let set = digests(20, "d");
        let a = codec.serialize(&set, &BTreeSet::new()).await.unwrap();
        let b = codec.serialize(&set, &BTreeSet::new()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_internal_node_is_corrupt() {
        let (store, codec) = codec(2);
        let encoded = codec
            .serialize(&digests(10, "d"), &BTreeSet::new())
            .await
            .unwrap();
        let victim = encoded
            .internal
            .iter()
            .find(|d| **d != encoded.root)
            .copied()
            .unwrap();
        store.delete(&victim).await.unwrap();

        let err = codec.deserialize(encoded.root).await.unwrap_err();
        assert!(matches!(err, PinError::CorruptPinSet(_)));
    }

    #[tokio::test]
    async fn data_node_is_not_a_pin_set() {
        let (store, codec) = codec(8);
        let plain = store.put(&DagNode::leaf(b"hello".to_vec())).await.unwrap();
        let err = codec.deserialize(plain).await.unwrap_err();
        assert!(matches!(err, PinError::CorruptPinSet(_)));
    }

    #[tokio::test]
    async fn garbage_payload_is_corrupt() {
        let (store, codec) = codec(8);
        let junk = DagNode::new(NodeKind::PinSet, vec![0xff; 3], Vec::new());
        let root = store.put(&junk).await.unwrap();
        assert!(matches!(
            codec.deserialize(root).await.unwrap_err(),
            PinError::CorruptPinSet(_)
        ));
    }

    #[tokio::test]
    async fn future_version_is_rejected() {
        let (store, codec) = codec(8);
        let empty = store
            .put(&DagNode::new(
                NodeKind::PinSet,
                encode(&PinSetNode::Leaf {
                    depth: 0,
                    members: vec![],
                })
                .unwrap(),
                vec![],
            ))
            .await
            .unwrap();
        let header = PinSetNode::Header {
            version: PIN_SET_VERSION + 1,
            recursive_count: 0,
            direct_count: 0,
        };
        let root = store
            .put(&DagNode::new(
                NodeKind::PinSet,
                encode(&header).unwrap(),
                vec![empty, empty],
            ))
            .await
            .unwrap();
        let err = codec.deserialize(root).await.unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[tokio::test]
    async fn member_under_wrong_prefix_is_corrupt() {
        let (store, codec) = codec(8);
        let mut raw = [0u8; 32];
        raw[0] = 0x01;
        let member = Digest::from_hash(raw);
        let leaf = store
            .put(&DagNode::new(
                NodeKind::PinSet,
                encode(&PinSetNode::Leaf {
                    depth: 1,
                    members: vec![member],
                })
                .unwrap(),
                vec![],
            ))
            .await
            .unwrap();
        // Bucket claims the leaf holds digests starting with 0x02.
        let bucket = store
            .put(&DagNode::new(
                NodeKind::PinSet,
                encode(&PinSetNode::Bucket {
                    depth: 0,
                    slots: vec![0x02],
                })
                .unwrap(),
                vec![leaf],
            ))
            .await
            .unwrap();
        let empty = store
            .put(&DagNode::new(
                NodeKind::PinSet,
                encode(&PinSetNode::Leaf {
                    depth: 0,
                    members: vec![],
                })
                .unwrap(),
                vec![],
            ))
            .await
            .unwrap();
        let header = PinSetNode::Header {
            version: PIN_SET_VERSION,
            recursive_count: 1,
            direct_count: 0,
        };
        let root = store
            .put(&DagNode::new(
                NodeKind::PinSet,
                encode(&header).unwrap(),
                vec![bucket, empty],
            ))
            .await
            .unwrap();

        let err = codec.deserialize(root).await.unwrap_err();
        assert!(err.to_string().contains("wrong prefix"));
    }

    proptest! {
        #[test]
        fn arbitrary_groups_round_trip(
            direct in proptest::collection::btree_set(any::<[u8; 32]>(), 0..40),
            recursive in proptest::collection::btree_set(any::<[u8; 32]>(), 0..40),
            max_items in 1usize..6,
        ) {
            let direct: BTreeSet<Digest> = direct.into_iter().map(Digest::from_hash).collect();
            // The two explicit groups are disjoint by construction.
            let recursive: BTreeSet<Digest> = recursive
                .into_iter()
                .map(Digest::from_hash)
                .filter(|d| !direct.contains(d))
                .collect();

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let decoded = rt.block_on(async {
                let (_, codec) = codec(max_items);
                let encoded = codec.serialize(&direct, &recursive).await.unwrap();
                codec.deserialize(encoded.root).await.unwrap()
            });
            prop_assert_eq!(decoded.direct, direct);
            prop_assert_eq!(decoded.recursive, recursive);
        }
    }
}

use serde::{Deserialize, Serialize};
use cairn_crypto::ContentHasher;
use cairn_types::Digest;

/// The kind of a stored node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// User content: file chunks, directories, arbitrary DAG data.
    Data,
    /// Internal structure of a persisted pin set.
    PinSet,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data => write!(f, "data"),
            Self::PinSet => write!(f, "pinset"),
        }
    }
}

/// An immutable DAG node: kind tag, opaque payload and ordered links.
///
/// The store never interprets `data`; `links` are the edges of the Merkle
/// DAG and their order is significant (it feeds the digest and fixes the
/// traversal order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagNode {
    /// The type of this node.
    pub kind: NodeKind,
    /// Opaque payload bytes.
    pub data: Vec<u8>,
    /// Digests of the child nodes, in link order.
    pub links: Vec<Digest>,
}

impl DagNode {
    /// Create a node from its parts.
    pub fn new(kind: NodeKind, data: Vec<u8>, links: Vec<Digest>) -> Self {
        Self { kind, data, links }
    }

    /// A user data node with no links.
    pub fn leaf(data: impl Into<Vec<u8>>) -> Self {
        Self::new(NodeKind::Data, data.into(), Vec::new())
    }

    /// A user data node linking to `links`.
    pub fn branch(data: impl Into<Vec<u8>>, links: Vec<Digest>) -> Self {
        Self::new(NodeKind::Data, data.into(), links)
    }

    /// Compute the content-addressed digest of this node.
    ///
    /// The hashed message is the length-prefixed payload followed by the
    /// link count and every link, under the hasher for the node's kind.
    pub fn digest(&self) -> Digest {
        let hasher = match self.kind {
            NodeKind::Data => &ContentHasher::NODE,
            NodeKind::PinSet => &ContentHasher::PIN_SET,
        };
        let data_len = (self.data.len() as u64).to_le_bytes();
        let link_count = (self.links.len() as u64).to_le_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.links.len() + 3);
        parts.push(&data_len);
        parts.push(&self.data);
        parts.push(&link_count);
        parts.extend(self.links.iter().map(|l| l.as_ref()));
        hasher.hash_parts(&parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let node = DagNode::leaf(b"deterministic".to_vec());
        assert_eq!(node.digest(), node.digest());
    }

    #[test]
    fn links_change_the_digest() {
        let child = DagNode::leaf(b"child".to_vec()).digest();
        let bare = DagNode::leaf(b"parent".to_vec());
        let linked = DagNode::branch(b"parent".to_vec(), vec![child]);
        assert_ne!(bare.digest(), linked.digest());
    }

    #[test]
    fn link_order_changes_the_digest() {
        let a = DagNode::leaf(b"a".to_vec()).digest();
        let b = DagNode::leaf(b"b".to_vec()).digest();
        let ab = DagNode::branch(Vec::new(), vec![a, b]);
        let ba = DagNode::branch(Vec::new(), vec![b, a]);
        assert_ne!(ab.digest(), ba.digest());
    }

    #[test]
    fn payload_and_link_boundary_is_unambiguous() {
        let link = DagNode::leaf(b"x".to_vec()).digest();
        let with_link = DagNode::branch(Vec::new(), vec![link]);
        let inlined = DagNode::leaf(link.as_bytes().to_vec());
        assert_ne!(with_link.digest(), inlined.digest());
    }

    #[test]
    fn kinds_are_domain_separated() {
        let data = DagNode::new(NodeKind::Data, b"same".to_vec(), Vec::new());
        let pins = DagNode::new(NodeKind::PinSet, b"same".to_vec(), Vec::new());
        assert_ne!(data.digest(), pins.digest());
    }

    #[test]
    fn kind_display() {
        assert_eq!(NodeKind::Data.to_string(), "data");
        assert_eq!(NodeKind::PinSet.to_string(), "pinset");
    }
}

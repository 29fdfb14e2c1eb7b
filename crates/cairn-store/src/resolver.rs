use cairn_types::Digest;

use crate::node::DagNode;

/// Extracts the ordered child digests of a node.
///
/// Traversals never look inside a node's payload themselves; they ask the
/// resolver. This keeps link semantics (which payload codecs embed extra
/// references, which links are structural) outside the pinning core.
pub trait DagResolver: Send + Sync {
    /// The children of `node`, in traversal order.
    fn links_of(&self, node: &DagNode) -> Vec<Digest>;
}

/// Resolver that returns a node's own link list unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeLinks;

impl DagResolver for NodeLinks {
    fn links_of(&self, node: &DagNode) -> Vec<Digest> {
        node.links.clone()
    }
}

use async_trait::async_trait;
use cairn_types::Digest;

use crate::error::StoreResult;
use crate::node::DagNode;

/// Content-addressed node store.
///
/// All implementations must satisfy these invariants:
/// - Nodes are immutable once written: the same node always produces the
///   same digest.
/// - A missing node is `Ok(None)` / `Ok(false)`, not an error. Fetching it
///   from peers is the caller's business.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a node by digest.
    ///
    /// Returns `Ok(None)` if the node is not present locally.
    async fn get(&self, digest: &Digest) -> StoreResult<Option<DagNode>>;

    /// Write a node and return its digest.
    ///
    /// Writing a node that is already present is a no-op.
    async fn put(&self, node: &DagNode) -> StoreResult<Digest>;

    /// Check whether a node is present locally.
    async fn has(&self, digest: &Digest) -> StoreResult<bool>;

    /// Delete a node. Returns `true` if it was present.
    ///
    /// This is intended for garbage collection only.
    async fn delete(&self, digest: &Digest) -> StoreResult<bool>;

    /// Write several nodes and return their digests in order.
    ///
    /// Default implementation calls `put()` for each node.
    async fn put_many(&self, nodes: &[DagNode]) -> StoreResult<Vec<Digest>> {
        let mut digests = Vec::with_capacity(nodes.len());
        for node in nodes {
            digests.push(self.put(node).await?);
        }
        Ok(digests)
    }
}

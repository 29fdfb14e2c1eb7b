use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use cairn_types::Digest;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::node::DagNode;
use crate::traits::ObjectStore;

/// In-memory, HashMap-based node store.
///
/// Intended for tests and embedding. All nodes are held in memory behind a
/// `RwLock`; the lock is never held across an await point. Nodes are cloned
/// on read/write.
pub struct InMemoryObjectStore {
    nodes: RwLock<HashMap<Digest, DagNode>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Number of nodes currently stored.
    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    /// Store `node` under `digest` without checking that the digest matches.
    ///
    /// Models a backend holding untrusted or corrupted data, e.g. link
    /// structures that loop back on themselves.
    pub fn insert_unverified(&self, digest: Digest, node: DagNode) {
        self.write_map().insert(digest, node);
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Digest, DagNode>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Digest, DagNode>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, digest: &Digest) -> StoreResult<Option<DagNode>> {
        Ok(self.read_map().get(digest).cloned())
    }

    async fn put(&self, node: &DagNode) -> StoreResult<Digest> {
        let digest = node.digest();
        if digest.is_null() {
            return Err(StoreError::NullDigest);
        }
        // Idempotent: content addressing guarantees the same digest always
        // maps to the same node.
        self.write_map().entry(digest).or_insert_with(|| node.clone());
        trace!(digest = %digest.short_hex(), kind = %node.kind, "stored node");
        Ok(digest)
    }

    async fn has(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.read_map().contains_key(digest))
    }

    async fn delete(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.write_map().remove(digest).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("node_count", &self.len())
            .finish()
    }
}

//! Content-addressed DAG node storage for Cairn.
//!
//! Every object in a Cairn repository is an immutable [`DagNode`]: a kind
//! tag, an opaque payload and an ordered list of links to other nodes. A
//! node is identified by the domain-separated BLAKE3 digest of its kind,
//! payload and links, so a link list is a Merkle DAG edge set.
//!
//! # Collaborators
//!
//! - [`ObjectStore`]: async get/put/has/delete of nodes by digest. A store
//!   may legitimately answer "not present" for objects not fetched yet.
//! - [`DagResolver`]: extracts the ordered child digests of a node. The
//!   default [`NodeLinks`] resolver returns the node's own link list.
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`]: `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Nodes are immutable once written (content addressing guarantees this).
//! 2. Concurrent reads are always safe.
//! 3. The store never interprets node payloads.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod node;
pub mod resolver;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use node::{DagNode, NodeKind};
pub use resolver::{DagResolver, NodeLinks};
pub use traits::ObjectStore;

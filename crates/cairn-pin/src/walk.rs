//! Reachability over the object store's DAG.
//!
//! [`DagWalker`] answers two questions about a root digest: which digests
//! lie below it ([`DagWalker::descendants_of`]) and whether one particular
//! digest does ([`DagWalker::is_reachable`]). Both fetch nodes lazily from
//! the [`ObjectStore`] and both keep a visited set, so link structures that
//! loop back on themselves (which honest content addressing cannot produce,
//! but corrupted or hostile data can) still terminate.
//!
//! A node that cannot be fetched is an error, never an empty subtree.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::Stream;
use tracing::trace;

use cairn_store::{DagNode, DagResolver, NodeLinks, ObjectStore};
use cairn_types::Digest;

use crate::error::{PinError, PinResult};

/// Traversal engine over an object store.
#[derive(Clone)]
pub struct DagWalker {
    store: Arc<dyn ObjectStore>,
    resolver: Arc<dyn DagResolver>,
}

impl std::fmt::Debug for DagWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagWalker").finish_non_exhaustive()
    }
}

/// Outcome of [`DagWalker::is_reachable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reachability {
    pub reachable: bool,
    /// Link path `root, .., target` when reachable, empty otherwise.
    pub trace: Vec<Digest>,
}

impl DagWalker {
    /// Walker using each node's own link list.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_resolver(store, Arc::new(NodeLinks))
    }

    /// Walker using a custom link resolver.
    pub fn with_resolver(store: Arc<dyn ObjectStore>, resolver: Arc<dyn DagResolver>) -> Self {
        Self { store, resolver }
    }

    /// Fetch a node, treating absence as [`PinError::MissingObject`].
    pub async fn fetch(&self, digest: &Digest) -> PinResult<DagNode> {
        self.store
            .get(digest)
            .await?
            .ok_or(PinError::MissingObject(*digest))
    }

    /// Returns `true` if the node is present locally.
    pub async fn has(&self, digest: &Digest) -> PinResult<bool> {
        Ok(self.store.has(digest).await?)
    }

    /// Lazy depth-first enumeration of everything reachable from `root`.
    ///
    /// Each call starts a fresh walk. The root itself is not yielded.
    pub fn descendants_of(&self, root: Digest) -> Descendants {
        Descendants {
            walker: self.clone(),
            root,
            started: false,
            done: false,
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Whether `target` is reachable from `root` through one or more links.
    ///
    /// Stops as soon as `target` shows up in the link list of a visited
    /// node; `target` itself does not need to be present locally. A digest
    /// is not considered reachable from itself.
    pub async fn is_reachable(&self, root: Digest, target: Digest) -> PinResult<Reachability> {
        if root == target {
            return Ok(Reachability {
                reachable: false,
                trace: Vec::new(),
            });
        }

        let mut visited = HashSet::from([root]);
        let mut parent: HashMap<Digest, Digest> = HashMap::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let node = self.fetch(&current).await?;
            let links = self.resolver.links_of(&node);

            if links.contains(&target) {
                let mut trace = vec![target, current];
                let mut cursor = current;
                while let Some(prev) = parent.get(&cursor) {
                    trace.push(*prev);
                    cursor = *prev;
                }
                trace.reverse();
                trace!(root = %root.short_hex(), target = %target.short_hex(), depth = trace.len() - 1, "target reachable");
                return Ok(Reachability {
                    reachable: true,
                    trace,
                });
            }

            // Reverse so the first link is explored first.
            for link in links.into_iter().rev() {
                if visited.insert(link) {
                    parent.insert(link, current);
                    stack.push(link);
                }
            }
        }

        Ok(Reachability {
            reachable: false,
            trace: Vec::new(),
        })
    }
}

/// Single-pass cursor over the descendants of a root.
///
/// Digests come out in depth-first pre-order, following each node's link
/// order, each at most once. After an error the cursor yields nothing more.
pub struct Descendants {
    walker: DagWalker,
    root: Digest,
    started: bool,
    done: bool,
    stack: Vec<Digest>,
    visited: HashSet<Digest>,
}

impl Descendants {
    /// The root this walk started from.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Number of distinct digests seen so far, root included.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Advance to the next descendant.
    ///
    /// Every yielded digest has been fetched, so the walk doubles as a
    /// presence check for the whole subtree.
    pub async fn next(&mut self) -> PinResult<Option<Digest>> {
        if self.done {
            return Ok(None);
        }
        match self.step().await {
            Ok(Some(digest)) => Ok(Some(digest)),
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    async fn step(&mut self) -> PinResult<Option<Digest>> {
        if !self.started {
            self.started = true;
            self.visited.insert(self.root);
            let node = self.walker.fetch(&self.root).await?;
            self.push_links(&node);
        }

        while let Some(digest) = self.stack.pop() {
            if !self.visited.insert(digest) {
                continue;
            }
            let node = self.walker.fetch(&digest).await?;
            self.push_links(&node);
            return Ok(Some(digest));
        }
        Ok(None)
    }

    fn push_links(&mut self, node: &DagNode) {
        let links = self.walker.resolver.links_of(node);
        self.stack.extend(
            links
                .into_iter()
                .rev()
                .filter(|link| !self.visited.contains(link)),
        );
    }

    /// Drain the walk into a vector.
    pub async fn collect_all(mut self) -> PinResult<Vec<Digest>> {
        let mut out = Vec::new();
        while let Some(digest) = self.next().await? {
            out.push(digest);
        }
        Ok(out)
    }

    /// Adapt the cursor into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = PinResult<Digest>> + Send {
        futures::stream::try_unfold(self, |mut walk| async move {
            let next = walk.next().await?;
            Ok::<_, PinError>(next.map(|digest| (digest, walk)))
        })
    }
}

//! The pin manager.
//!
//! Readers work on an immutable [`PinState`] snapshot taken from a
//! short-lived lock. Mutations are serialized by an async writer mutex and
//! run their commit phase (build the new snapshot, flush it, swap it in)
//! in a spawned task that owns the mutex guard. A caller that stops
//! polling therefore cannot leave the in-memory set ahead of, or behind,
//! the persisted one.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cairn_repo::RepoStore;
use cairn_store::{DagResolver, ObjectStore};
use cairn_types::Digest;

use crate::codec::PinSetCodec;
use crate::config::PinConfig;
use crate::error::{PinError, PinResult};
use crate::listing::PinListing;
use crate::state::PinState;
use crate::types::{AddOptions, LsOptions, PinCounts, PinType, QueryResult, RmOptions};
use crate::walk::{DagWalker, Descendants};

struct Inner {
    walker: DagWalker,
    codec: PinSetCodec,
    repo: Arc<dyn RepoStore>,
    config: PinConfig,
    state: RwLock<Arc<PinState>>,
    writer: Arc<Mutex<()>>,
}

/// Tracks which digests are protected from garbage collection.
///
/// Cheap to clone; clones share the same pin set.
#[derive(Clone)]
pub struct PinManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PinManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts = self.counts();
        f.debug_struct("PinManager")
            .field("pin_key", &self.inner.config.pin_key)
            .field("direct", &counts.direct)
            .field("recursive", &counts.recursive)
            .finish_non_exhaustive()
    }
}

impl PinManager {
    /// Open the pin set persisted in `repo`, or an empty one if the repo
    /// has none yet.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        repo: Arc<dyn RepoStore>,
        config: PinConfig,
    ) -> PinResult<Self> {
        let walker = DagWalker::new(store.clone());
        Self::open_inner(store, walker, repo, config).await
    }

    /// Like [`open`](Self::open) with a custom link resolver.
    pub async fn open_with_resolver(
        store: Arc<dyn ObjectStore>,
        resolver: Arc<dyn DagResolver>,
        repo: Arc<dyn RepoStore>,
        config: PinConfig,
    ) -> PinResult<Self> {
        let walker = DagWalker::with_resolver(store.clone(), resolver);
        Self::open_inner(store, walker, repo, config).await
    }

    async fn open_inner(
        store: Arc<dyn ObjectStore>,
        walker: DagWalker,
        repo: Arc<dyn RepoStore>,
        config: PinConfig,
    ) -> PinResult<Self> {
        config.validate()?;
        let manager = Self {
            inner: Arc::new(Inner {
                walker,
                codec: PinSetCodec::new(store, config.max_items_per_node),
                repo,
                config,
                state: RwLock::new(Arc::new(PinState::default())),
                writer: Arc::new(Mutex::new(())),
            }),
        };
        if let Err(e) = manager.load().await {
            if e.is_fatal() {
                error!(key = %manager.inner.config.pin_key, error = %e, "refusing to open corrupt pin set");
            }
            return Err(e);
        }
        Ok(manager)
    }

    /// Settings this manager was opened with.
    pub fn config(&self) -> &PinConfig {
        &self.inner.config
    }

    /// The traversal engine over the backing object store.
    pub fn walker(&self) -> &DagWalker {
        &self.inner.walker
    }

    fn snapshot(&self) -> Arc<PinState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, next: PinState) {
        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    // ------------------------------------------------------------------
    // Pinning
    // ------------------------------------------------------------------

    /// Pin `digest`.
    ///
    /// A recursive pin requires the whole subtree to be present locally and
    /// replaces a direct pin on the same digest. A direct pin is rejected
    /// for a digest that is already a recursive root. Pinning something
    /// that is already pinned the same way is a no-op.
    ///
    /// Dropping the returned future (for example on a caller timeout) while
    /// the subtree is still being validated leaves the pin set untouched.
    /// Once validation has finished, the commit runs on its own task and
    /// completes even if the caller has given up, so the pin may land after
    /// the caller observed the timeout.
    pub async fn add(&self, digest: Digest, options: AddOptions) -> PinResult<()> {
        if !self.validate_add(digest, options).await? {
            return Ok(());
        }
        self.apply_add(vec![digest], options).await
    }

    /// [`add`](Self::add) that gives up with [`PinError::Cancelled`] if
    /// `token` fires before the pin is committed.
    ///
    /// The token is only observed until the commit starts; a commit in
    /// flight is not interrupted.
    pub async fn add_cancellable(
        &self,
        digest: Digest,
        options: AddOptions,
        token: &CancellationToken,
    ) -> PinResult<()> {
        let needed = tokio::select! {
            biased;
            () = token.cancelled() => {
                warn!(digest = %digest.short_hex(), "pin cancelled during validation");
                return Err(PinError::Cancelled);
            }
            needed = self.validate_add(digest, options) => needed?,
        };
        if !needed {
            return Ok(());
        }
        if token.is_cancelled() {
            warn!(digest = %digest.short_hex(), "pin cancelled before commit");
            return Err(PinError::Cancelled);
        }
        self.apply_add(vec![digest], options).await
    }

    /// Pin every digest in `digests` with the same options, or none of them.
    ///
    /// Dropping the future behaves as for [`add`](Self::add).
    pub async fn add_all(&self, digests: &[Digest], options: AddOptions) -> PinResult<()> {
        let mut pending = Vec::new();
        for digest in digests {
            if self.validate_add(*digest, options).await? && !pending.contains(digest) {
                pending.push(*digest);
            }
        }
        if pending.is_empty() {
            return Ok(());
        }
        self.apply_add(pending, options).await
    }

    /// Check that `digest` can be pinned. Returns `false` when the pin
    /// already exists.
    async fn validate_add(&self, digest: Digest, options: AddOptions) -> PinResult<bool> {
        let state = self.snapshot();
        if options.recursive {
            if state.recursive.contains(&digest) {
                debug!(digest = %digest.short_hex(), "already pinned recursively");
                return Ok(false);
            }
            self.validate_subtree(digest).await?;
            return Ok(true);
        }

        if state.recursive.contains(&digest) {
            warn!(digest = %digest.short_hex(), "direct pin rejected: already recursive");
            return Err(PinError::AlreadyPinnedRecursively(digest));
        }
        if state.direct.contains(&digest) {
            debug!(digest = %digest.short_hex(), "already pinned directly");
            return Ok(false);
        }
        if !self.inner.walker.has(&digest).await? {
            warn!(digest = %digest.short_hex(), "direct pin rejected: object missing");
            return Err(PinError::MissingObject(digest));
        }
        Ok(true)
    }

    /// Walk the entire subtree of `root`, failing on the first absent node.
    async fn validate_subtree(&self, root: Digest) -> PinResult<()> {
        let mut walk = self.inner.walker.descendants_of(root);
        loop {
            match walk.next().await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(PinError::MissingObject(missing)) if missing == root => {
                    warn!(digest = %root.short_hex(), "recursive pin rejected: root missing");
                    return Err(PinError::MissingObject(root));
                }
                Err(PinError::MissingObject(missing)) => {
                    warn!(
                        digest = %root.short_hex(),
                        missing = %missing.short_hex(),
                        "recursive pin rejected: subtree incomplete"
                    );
                    return Err(PinError::IncompletePin { root, missing });
                }
                Err(e) => return Err(e),
            }
        }
        debug!(digest = %root.short_hex(), nodes = walk.visited(), "subtree complete");
        Ok(())
    }

    async fn apply_add(&self, digests: Vec<Digest>, options: AddOptions) -> PinResult<()> {
        let recursive = options.recursive;
        let count = digests.len();
        let applied = digests.clone();
        let changed = self
            .commit(digests, move |state| {
                let mut next = state.clone();
                let mut changed = false;
                for digest in &applied {
                    if recursive {
                        if next.recursive.insert(*digest) {
                            next.direct.remove(digest);
                            changed = true;
                        }
                    } else if next.recursive.contains(digest) {
                        return Err(PinError::AlreadyPinnedRecursively(*digest));
                    } else {
                        changed |= next.direct.insert(*digest);
                    }
                }
                Ok(changed.then_some(next))
            })
            .await?;
        if changed {
            let pin_type = if recursive {
                PinType::Recursive
            } else {
                PinType::Direct
            };
            info!(%pin_type, count, "pinned");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Unpinning
    // ------------------------------------------------------------------

    /// Remove the explicit pin on `digest`.
    ///
    /// Digests protected only through a recursive root cannot be unpinned
    /// on their own; remove the root instead. With
    /// `RmOptions { recursive: false }`, recursive roots are refused too.
    pub async fn rm(&self, digest: Digest, options: RmOptions) -> PinResult<()> {
        let state = self.snapshot();
        if !state.recursive.contains(&digest) && !state.direct.contains(&digest) {
            let err = match state.indirect_root(&self.inner.walker, &digest).await? {
                Some(root) => PinError::PinnedIndirectly { digest, root },
                None => PinError::NotPinned(digest),
            };
            warn!(digest = %digest.short_hex(), error = %err, "unpin rejected");
            return Err(err);
        }

        let allow_recursive = options.recursive;
        let result = self
            .commit(Vec::new(), move |state| {
                let mut next = state.clone();
                if next.recursive.contains(&digest) {
                    if !allow_recursive {
                        return Err(PinError::PinnedRecursively(digest));
                    }
                    next.recursive.remove(&digest);
                } else if !next.direct.remove(&digest) {
                    return Err(PinError::NotPinned(digest));
                }
                Ok(Some(next))
            })
            .await;
        match result {
            Ok(_) => {
                info!(digest = %digest.short_hex(), "unpinned");
                Ok(())
            }
            Err(e) => {
                warn!(digest = %digest.short_hex(), error = %e, "unpin rejected");
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// List pins matching `options` over the current snapshot.
    pub fn ls(&self, options: LsOptions) -> PinListing {
        PinListing::new(self.snapshot(), self.inner.walker.clone(), options)
    }

    /// Whether `digest` is pinned as `pin_type`, and why.
    pub async fn is_pinned_with_type(
        &self,
        digest: Digest,
        pin_type: PinType,
    ) -> PinResult<QueryResult> {
        self.snapshot()
            .query(&self.inner.walker, &digest, pin_type)
            .await
    }

    /// Shorthand for [`is_pinned_with_type`](Self::is_pinned_with_type)
    /// with [`PinType::All`].
    pub async fn is_pinned(&self, digest: Digest) -> PinResult<QueryResult> {
        self.is_pinned_with_type(digest, PinType::All).await
    }

    /// Number of explicit direct and recursive roots.
    pub fn counts(&self) -> PinCounts {
        self.snapshot().counts()
    }

    /// Nodes making up the persisted pin-set encoding.
    pub fn internal_pins(&self) -> BTreeSet<Digest> {
        self.snapshot().internal.clone()
    }

    /// Digest of the persisted pin-set header, if one has been written.
    pub fn persisted_root(&self) -> Option<Digest> {
        self.snapshot().persisted_root
    }

    /// Lazy walk below `root`, using this manager's resolver.
    pub fn descendants_of(&self, root: Digest) -> Descendants {
        self.inner.walker.descendants_of(root)
    }

    /// Everything a garbage collector must keep: recursive roots with
    /// their subtrees, direct roots and the pin-set nodes themselves.
    pub async fn gc_protected(&self) -> PinResult<BTreeSet<Digest>> {
        let state = self.snapshot();
        let mut keep: BTreeSet<Digest> = state.internal.clone();
        keep.extend(state.direct.iter().copied());
        for root in &state.recursive {
            if !keep.insert(*root) {
                continue;
            }
            let mut walk = self.inner.walker.descendants_of(*root);
            while let Some(digest) = walk.next().await? {
                keep.insert(digest);
            }
        }
        debug!(protected = keep.len(), "computed gc protected set");
        Ok(keep)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the current pin set to the repo.
    pub async fn flush(&self) -> PinResult<()> {
        self.commit(Vec::new(), |state| Ok(Some(state.clone())))
            .await
            .map(|_| ())
    }

    /// Replace the in-memory pin set with the persisted one.
    ///
    /// An absent key yields an empty set. Anything unreadable is
    /// [`PinError::CorruptPinSet`].
    pub async fn load(&self) -> PinResult<()> {
        self.exclusive(|manager| async move {
            let state = manager.read_persisted().await?;
            info!(
                direct = state.direct.len(),
                recursive = state.recursive.len(),
                "loaded pin set"
            );
            manager.install(state);
            Ok(())
        })
        .await
    }

    async fn read_persisted(&self) -> PinResult<PinState> {
        let key = &self.inner.config.pin_key;
        let Some(bytes) = self.inner.repo.read_key(key).await? else {
            debug!(%key, "no persisted pin set");
            return Ok(PinState::default());
        };
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| PinError::CorruptPinSet(format!("{key} is not valid UTF-8")))?;
        let root = Digest::from_hex(text)
            .map_err(|e| PinError::CorruptPinSet(format!("{key} does not hold a digest: {e}")))?;
        let decoded = self.inner.codec.deserialize(root).await?;
        Ok(PinState {
            direct: decoded.direct,
            recursive: decoded.recursive,
            internal: decoded.internal,
            persisted_root: Some(root),
        })
    }

    async fn persist(&self, mut next: PinState) -> PinResult<PinState> {
        let encoded = self
            .inner
            .codec
            .serialize(&next.direct, &next.recursive)
            .await?;
        self.inner
            .repo
            .write_key(&self.inner.config.pin_key, encoded.root.to_hex().as_bytes())
            .await?;
        info!(
            root = %encoded.root.short_hex(),
            nodes = encoded.internal.len(),
            "flushed pin set"
        );
        next.internal = encoded.internal;
        next.persisted_root = Some(encoded.root);
        Ok(next)
    }

    /// Apply `mutate` to the current snapshot under the writer mutex,
    /// persist the result and install it.
    ///
    /// Every digest in `verify` must still be present in the store.
    /// `mutate` returns `None` when nothing changes; the result is then
    /// `false` and nothing is written.
    async fn commit<F>(&self, verify: Vec<Digest>, mutate: F) -> PinResult<bool>
    where
        F: FnOnce(&PinState) -> PinResult<Option<PinState>> + Send + 'static,
    {
        self.exclusive(move |manager| async move {
            for digest in &verify {
                if !manager.inner.walker.has(digest).await? {
                    return Err(PinError::MissingObject(*digest));
                }
            }
            let current = manager.snapshot();
            let Some(next) = mutate(&*current)? else {
                return Ok(false);
            };
            let next = manager.persist(next).await?;
            manager.install(next);
            Ok(true)
        })
        .await
    }

    /// Run `task` on its own tokio task while holding the writer mutex.
    async fn exclusive<T, F, Fut>(&self, task: F) -> PinResult<T>
    where
        T: Send + 'static,
        F: FnOnce(PinManager) -> Fut + Send + 'static,
        Fut: Future<Output = PinResult<T>> + Send + 'static,
    {
        let guard = self.inner.writer.clone().lock_owned().await;
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task(manager).await
        });
        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(PinError::Cancelled),
        }
    }
}

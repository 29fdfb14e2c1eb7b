//! Error types for pin operations.

use cairn_types::Digest;

/// Errors that can occur while pinning, unpinning or persisting pins.
///
/// Every mutation error is transactional: when an operation returns one of
/// these, the in-memory pin set and the persisted snapshot are exactly as
/// they were before the call.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    /// An object needed to validate or traverse a pin is not present locally.
    #[error("object not found: {0}")]
    MissingObject(Digest),

    /// A recursive pin was rejected because part of its subtree is missing.
    #[error("cannot pin {root} recursively: descendant {missing} is not available")]
    IncompletePin {
        /// The requested recursive root.
        root: Digest,
        /// The first missing descendant encountered.
        missing: Digest,
    },

    /// Direct pinning of a digest that is already a recursive root.
    #[error("{0} already pinned recursively")]
    AlreadyPinnedRecursively(Digest),

    /// Non-recursive removal of a recursive root.
    #[error("{0} is pinned recursively")]
    PinnedRecursively(Digest),

    /// Removal of a digest that is only protected through a recursive root.
    #[error("{digest} is pinned indirectly under {root}")]
    PinnedIndirectly {
        /// The digest the caller tried to unpin.
        digest: Digest,
        /// The recursive root that reaches it.
        root: Digest,
    },

    /// Removal of a digest that is not pinned at all.
    #[error("{0} is not pinned")]
    NotPinned(Digest),

    /// The persisted pin set could not be read back.
    #[error("corrupt pin set: {0}")]
    CorruptPinSet(String),

    /// The operation was cancelled before it took effect.
    #[error("pin operation cancelled")]
    Cancelled,

    /// Object store failure.
    #[error("store error: {0}")]
    Store(#[from] cairn_store::StoreError),

    /// Repository key store failure.
    #[error("repo error: {0}")]
    Repo(#[from] cairn_repo::RepoError),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Encoding failure while writing the pin set.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl PinError {
    /// Returns `true` for errors that must stop the hosting node from
    /// starting rather than be reported per call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptPinSet(_))
    }
}

/// Convenience alias for pin results.
pub type PinResult<T> = Result<T, PinError>;

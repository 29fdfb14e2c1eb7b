/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Attempted to write a node whose digest is null.
    #[error("cannot store node with null digest")]
    NullDigest,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

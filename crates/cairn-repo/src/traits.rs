//! The [`RepoStore`] trait defining the repository key/value interface.

use async_trait::async_trait;

use crate::error::Result;

/// Storage backend for named repository values.
///
/// Implementations must be thread-safe (`Send + Sync`). A `write_key` either
/// replaces the whole value or leaves the previous one in place; readers
/// never observe a partially written value. Key names are validated with
/// [`validate_key_name`](crate::names::validate_key_name).
#[async_trait]
pub trait RepoStore: Send + Sync {
    /// Read the value stored under `name`.
    ///
    /// Returns `Ok(None)` if the key has never been written.
    async fn read_key(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace the value stored under `name`.
    async fn write_key(&self, name: &str, value: &[u8]) -> Result<()>;

    /// Delete a key.
    ///
    /// Returns `Ok(true)` if the key existed and was deleted, `Ok(false)` if
    /// it did not exist.
    async fn delete_key(&self, name: &str) -> Result<bool>;

    /// List all key names starting with `prefix`, sorted.
    ///
    /// Pass `""` to list every key.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

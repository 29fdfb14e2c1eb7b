//! In-memory key store for testing and ephemeral use.
//!
//! [`InMemoryRepo`] stores all values in a `HashMap` protected by a
//! `RwLock`. It implements the full [`RepoStore`] trait and is suitable for
//! unit tests and short-lived processes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RepoError, Result};
use crate::names::validate_key_name;
use crate::traits::RepoStore;

/// An in-memory implementation of [`RepoStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRepo {
    keys: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryRepo {
    /// Create a new empty key store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RepoError {
    RepoError::Backend(format!("lock poisoned: {e}"))
}

#[async_trait]
impl RepoStore for InMemoryRepo {
    async fn read_key(&self, name: &str) -> Result<Option<Vec<u8>>> {
        validate_key_name(name)?;
        let keys = self.keys.read().map_err(poisoned)?;
        Ok(keys.get(name).cloned())
    }

    async fn write_key(&self, name: &str, value: &[u8]) -> Result<()> {
        validate_key_name(name)?;
        let mut keys = self.keys.write().map_err(poisoned)?;
        keys.insert(name.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete_key(&self, name: &str) -> Result<bool> {
        validate_key_name(name)?;
        let mut keys = self.keys.write().map_err(poisoned)?;
        Ok(keys.remove(name).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = self.keys.read().map_err(poisoned)?;
        let mut names: Vec<String> = keys
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_unwritten_key_is_none() {
        let repo = InMemoryRepo::new();
        assert!(repo.read_key("local/pins").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read() {
        let repo = InMemoryRepo::new();
        repo.write_key("local/pins", b"root").await.unwrap();
        assert_eq!(
            repo.read_key("local/pins").await.unwrap().as_deref(),
            Some(&b"root"[..])
        );
    }

    #[tokio::test]
    async fn write_replaces_value() {
        let repo = InMemoryRepo::new();
        repo.write_key("version", b"1").await.unwrap();
        repo.write_key("version", b"2").await.unwrap();
        assert_eq!(repo.read_key("version").await.unwrap().unwrap(), b"2");
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let repo = InMemoryRepo::new();
        repo.write_key("local/pins", b"x").await.unwrap();
        assert!(repo.delete_key("local/pins").await.unwrap());
        assert!(!repo.delete_key("local/pins").await.unwrap());
    }

    #[tokio::test]
    async fn list_keys_filters_and_sorts() {
        let repo = InMemoryRepo::new();
        repo.write_key("local/pins", b"a").await.unwrap();
        repo.write_key("local/filesroot", b"b").await.unwrap();
        repo.write_key("version", b"c").await.unwrap();

        let local = repo.list_keys("local/").await.unwrap();
        assert_eq!(local, vec!["local/filesroot", "local/pins"]);
        assert_eq!(repo.list_keys("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn invalid_key_is_rejected() {
        let repo = InMemoryRepo::new();
        let err = repo.write_key("../pins", b"x").await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidKey { .. }));
    }
}

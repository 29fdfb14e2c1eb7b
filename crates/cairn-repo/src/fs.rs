//! Directory-backed key store.
//!
//! Each key is a file under the repository root; `/` in a key name maps to a
//! subdirectory. Writes stage the value in a temporary file in the target
//! directory, flush it to disk, then rename it over the old value, so a
//! crash leaves either the old or the new value and never a torn one.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RepoError, Result};
use crate::names::validate_key_name;
use crate::traits::RepoStore;

/// A [`RepoStore`] that keeps every key as a file below `root`.
#[derive(Clone, Debug)]
pub struct FsRepo {
    root: PathBuf,
}

impl FsRepo {
    /// Open (creating if needed) a key store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The directory holding the keys.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, name: &str) -> Result<PathBuf> {
        validate_key_name(name)?;
        Ok(name.split('/').fold(self.root.clone(), |p, c| p.join(c)))
    }
}

fn write_atomic(path: &Path, value: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| RepoError::Backend(format!("key path has no parent: {}", path.display())))?;
    std::fs::create_dir_all(dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(value)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| RepoError::Io(e.error))?;
    Ok(())
}

fn collect_keys(root: &Path, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_keys(root, &path, prefix, out)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        // Staged temp files start with '.' and never validate as keys.
        if validate_key_name(&name).is_ok() && name.starts_with(prefix) {
            out.push(name);
        }
    }
    Ok(())
}

fn join_error(e: tokio::task::JoinError) -> RepoError {
    RepoError::Backend(format!("blocking task failed: {e}"))
}

#[async_trait]
impl RepoStore for FsRepo {
    async fn read_key(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_key(&self, name: &str, value: &[u8]) -> Result<()> {
        let path = self.key_path(name)?;
        let value = value.to_vec();
        let len = value.len();
        tokio::task::spawn_blocking(move || write_atomic(&path, &value))
            .await
            .map_err(join_error)??;
        debug!(key = name, bytes = len, "wrote repo key");
        Ok(())
    }

    async fn delete_key(&self, name: &str) -> Result<bool> {
        let path = self.key_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        let mut names = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            collect_keys(&root, &root, &prefix, &mut out).map(|()| out)
        })
        .await
        .map_err(join_error)??;
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepo::open(dir.path()).await.unwrap();
        repo.write_key("local/pins", b"digest").await.unwrap();

        assert!(dir.path().join("local").join("pins").is_file());
        assert_eq!(
            repo.read_key("local/pins").await.unwrap().as_deref(),
            Some(&b"digest"[..])
        );
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = FsRepo::open(dir.path()).await.unwrap();
            repo.write_key("version", b"7").await.unwrap();
        }
        let reopened = FsRepo::open(dir.path()).await.unwrap();
        assert_eq!(reopened.read_key("version").await.unwrap().unwrap(), b"7");
    }

    #[tokio::test]
    async fn overwrite_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepo::open(dir.path()).await.unwrap();
        repo.write_key("local/pins", b"one").await.unwrap();
        repo.write_key("local/pins", b"two").await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("local"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(repo.read_key("local/pins").await.unwrap().unwrap(), b"two");
    }

    #[tokio::test]
    async fn missing_key_reads_none_and_deletes_false() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepo::open(dir.path()).await.unwrap();
        assert!(repo.read_key("local/pins").await.unwrap().is_none());
        assert!(!repo.delete_key("local/pins").await.unwrap());
    }

    #[tokio::test]
    async fn list_keys_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepo::open(dir.path()).await.unwrap();
        repo.write_key("local/pins", b"a").await.unwrap();
        repo.write_key("local/filesroot", b"b").await.unwrap();
        repo.write_key("version", b"c").await.unwrap();

        assert_eq!(
            repo.list_keys("local/").await.unwrap(),
            vec!["local/filesroot", "local/pins"]
        );
        assert_eq!(repo.list_keys("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepo::open(dir.path()).await.unwrap();
        let err = repo.write_key("../outside", b"x").await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidKey { .. }));
    }
}

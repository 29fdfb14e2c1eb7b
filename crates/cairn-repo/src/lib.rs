//! Repository key/value binding for Cairn.
//!
//! A repository keeps a handful of small, well-known values next to its
//! object store: the root digest of the persisted pin set, version markers
//! and the like. This crate defines the storage interface for those values
//! and two backends.
//!
//! # Modules
//!
//! - [`error`]: Error types for key operations
//! - [`traits`]: The [`RepoStore`] trait defining the storage interface
//! - [`names`]: Key name validation
//! - [`memory`]: In-memory [`InMemoryRepo`] for tests
//! - [`fs`]: Directory-backed [`FsRepo`] with atomic writes

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;

pub use error::{RepoError, Result};
pub use fs::FsRepo;
pub use memory::InMemoryRepo;
pub use names::validate_key_name;
pub use traits::RepoStore;

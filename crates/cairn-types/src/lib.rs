//! Foundation types for Cairn.
//!
//! Every object in a Cairn repository is addressed by a [`Digest`] of its
//! content. This crate defines that identifier and the errors produced when
//! parsing it. Every other Cairn crate depends on `cairn-types`.

pub mod digest;
pub mod error;

pub use digest::Digest;
pub use error::TypeError;

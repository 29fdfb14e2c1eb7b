//! Cryptographic primitives for Cairn.
//!
//! Provides domain-separated BLAKE3 hashing so that objects of different
//! kinds never share a digest even when their bytes are identical.

pub mod hasher;

pub use hasher::ContentHasher;

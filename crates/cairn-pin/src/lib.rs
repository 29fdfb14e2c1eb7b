//! Pin management for Cairn.
//!
//! A pin protects content from garbage collection. A *recursive* pin
//! protects a root digest and everything reachable from it, a *direct* pin
//! protects exactly one digest, and anything below a recursive root is
//! pinned *indirectly*. The [`PinManager`] keeps the two explicit groups,
//! answers membership queries with the reason a digest is protected, and
//! persists the set as a sharded, content-addressed structure in the
//! object store whose root digest lives under a repo key.

pub mod codec;
pub mod config;
pub mod error;
pub mod listing;
pub mod manager;
mod state;
pub mod types;
pub mod walk;

pub use codec::{DecodedPinSet, EncodedPinSet, PinSetCodec, PIN_SET_VERSION};
pub use config::{PinConfig, DEFAULT_MAX_ITEMS_PER_NODE, DEFAULT_PIN_KEY};
pub use error::{PinError, PinResult};
pub use listing::PinListing;
pub use manager::PinManager;
pub use types::{
    AddOptions, LsOptions, PinCounts, PinEntry, PinReason, PinType, QueryResult, RmOptions,
};
pub use walk::{DagWalker, Descendants, Reachability};

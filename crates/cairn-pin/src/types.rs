//! Pin classification, query results and operation options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use cairn_types::Digest;

use crate::error::PinError;

/// Why, or how, a digest is protected from garbage collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    /// Exactly this digest, none of its descendants.
    Direct,
    /// This digest and its entire reachable subtree.
    Recursive,
    /// Reachable from a recursive root without being a root itself.
    Indirect,
    /// Query wildcard: any of the above.
    #[default]
    All,
}

impl PinType {
    /// Lowercase name of the pin type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Recursive => "recursive",
            Self::Indirect => "indirect",
            Self::All => "all",
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinType {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "recursive" => Ok(Self::Recursive),
            "indirect" => Ok(Self::Indirect),
            "all" => Ok(Self::All),
            other => Err(PinError::Config(format!("unknown pin type: {other:?}"))),
        }
    }
}

/// The reason reported for a pinned digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PinReason {
    /// The digest is itself a recursive root.
    Recursive,
    /// The digest is itself a direct root.
    Direct,
    /// The digest is reachable from this recursive root.
    Indirect(Digest),
}

impl PinReason {
    /// The pin type this reason corresponds to.
    pub fn pin_type(&self) -> PinType {
        match self {
            Self::Recursive => PinType::Recursive,
            Self::Direct => PinType::Direct,
            Self::Indirect(_) => PinType::Indirect,
        }
    }
}

impl fmt::Display for PinReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recursive => f.write_str("recursive"),
            Self::Direct => f.write_str("direct"),
            Self::Indirect(root) => write!(f, "{root}"),
        }
    }
}

/// Answer to a pin membership query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryResult {
    pub pinned: bool,
    /// Present exactly when `pinned` is `true`.
    pub reason: Option<PinReason>,
}

impl QueryResult {
    /// A negative answer.
    pub const fn not_pinned() -> Self {
        Self {
            pinned: false,
            reason: None,
        }
    }

    /// A positive answer with its reason.
    pub const fn pinned(reason: PinReason) -> Self {
        Self {
            pinned: true,
            reason: Some(reason),
        }
    }
}

/// One row of a pin listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinEntry {
    pub digest: Digest,
    pub pin_type: PinType,
}

impl PinEntry {
    pub fn new(digest: Digest, pin_type: PinType) -> Self {
        Self { digest, pin_type }
    }
}

/// Number of explicit roots in each group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCounts {
    pub direct: usize,
    pub recursive: usize,
}

impl PinCounts {
    pub fn total(&self) -> usize {
        self.direct + self.recursive
    }
}

/// Options for [`PinManager::add`](crate::PinManager::add).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddOptions {
    /// Protect the whole subtree (`true`) or only the digest itself.
    pub recursive: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self { recursive: true }
    }
}

impl AddOptions {
    pub fn direct() -> Self {
        Self { recursive: false }
    }

    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

/// Options for [`PinManager::rm`](crate::PinManager::rm).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RmOptions {
    /// Allow removing a recursive root. With `false`, only direct pins can
    /// be removed.
    pub recursive: bool,
}

impl Default for RmOptions {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// Options for [`PinManager::ls`](crate::PinManager::ls).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LsOptions {
    /// Which classification to list.
    pub pin_type: PinType,
    /// Restrict the listing to one digest.
    pub digest: Option<Digest>,
}

impl LsOptions {
    pub fn of_type(pin_type: PinType) -> Self {
        Self {
            pin_type,
            digest: None,
        }
    }

    pub fn for_digest(digest: Digest) -> Self {
        Self {
            pin_type: PinType::All,
            digest: Some(digest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_type_parses_its_display() {
        for t in [
            PinType::Direct,
            PinType::Recursive,
            PinType::Indirect,
            PinType::All,
        ] {
            assert_eq!(t.to_string().parse::<PinType>().unwrap(), t);
        }
        assert!("strong".parse::<PinType>().is_err());
    }

    #[test]
    fn defaults_match_the_protocol() {
        assert!(AddOptions::default().recursive);
        assert!(RmOptions::default().recursive);
        let ls = LsOptions::default();
        assert_eq!(ls.pin_type, PinType::All);
        assert!(ls.digest.is_none());
    }

    #[test]
    fn indirect_reason_displays_root() {
        let root = Digest::from_bytes(b"root");
        assert_eq!(PinReason::Indirect(root).to_string(), root.to_hex());
        assert_eq!(PinReason::Indirect(root).pin_type(), PinType::Indirect);
    }

    #[test]
    fn negative_query_has_no_reason() {
        let q = QueryResult::not_pinned();
        assert!(!q.pinned);
        assert!(q.reason.is_none());
    }

    #[test]
    fn pin_type_serializes_lowercase() {
        let entry = PinEntry::new(Digest::null(), PinType::Indirect);
        let toml = toml::to_string(&entry).unwrap();
        assert!(toml.contains("pin_type = \"indirect\""));
    }
}

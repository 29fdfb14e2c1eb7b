use std::collections::BTreeSet;

use cairn_types::Digest;

use crate::error::PinResult;
use crate::types::{PinCounts, PinReason, PinType, QueryResult};
use crate::walk::DagWalker;

/// Immutable snapshot of the pin set.
///
/// `direct` and `recursive` are disjoint. `internal` and `persisted_root`
/// describe the last encoding written to the repo.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PinState {
    pub(crate) direct: BTreeSet<Digest>,
    pub(crate) recursive: BTreeSet<Digest>,
    pub(crate) internal: BTreeSet<Digest>,
    pub(crate) persisted_root: Option<Digest>,
}

impl PinState {
    pub(crate) fn counts(&self) -> PinCounts {
        PinCounts {
            direct: self.direct.len(),
            recursive: self.recursive.len(),
        }
    }

    /// First recursive root (in digest order) that reaches `digest`.
    ///
    /// Explicit recursive roots are never reported as indirect.
    pub(crate) async fn indirect_root(
        &self,
        walker: &DagWalker,
        digest: &Digest,
    ) -> PinResult<Option<Digest>> {
        if self.recursive.contains(digest) {
            return Ok(None);
        }
        for root in &self.recursive {
            if walker.is_reachable(*root, *digest).await?.reachable {
                return Ok(Some(*root));
            }
        }
        Ok(None)
    }

    /// Classify `digest` for one pin type. [`PinType::All`] checks
    /// recursive, then indirect, then direct.
    pub(crate) async fn query(
        &self,
        walker: &DagWalker,
        digest: &Digest,
        pin_type: PinType,
    ) -> PinResult<QueryResult> {
        let recursive = || self.recursive.contains(digest).then_some(PinReason::Recursive);
        let direct = || self.direct.contains(digest).then_some(PinReason::Direct);

        let reason = match pin_type {
            PinType::Recursive => recursive(),
            PinType::Direct => direct(),
            PinType::Indirect => self
                .indirect_root(walker, digest)
                .await?
                .map(PinReason::Indirect),
            PinType::All => match recursive() {
                Some(reason) => Some(reason),
                None => match self.indirect_root(walker, digest).await? {
                    Some(root) => Some(PinReason::Indirect(root)),
                    None => direct(),
                },
            },
        };
        Ok(reason.map_or_else(QueryResult::not_pinned, QueryResult::pinned))
    }
}

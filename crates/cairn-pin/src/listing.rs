//! Lazy enumeration of pins.

use std::collections::{BTreeSet, HashSet};
use std::ops::Bound;
use std::sync::Arc;

use futures::Stream;

use cairn_types::Digest;

use crate::error::{PinError, PinResult};
use crate::state::PinState;
use crate::types::{LsOptions, PinEntry, PinType};
use crate::walk::{DagWalker, Descendants};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Lookup(Digest),
    Recursive,
    Indirect,
    Direct,
    Done,
}

/// Cursor over the entries matched by an `ls` call.
///
/// Works on the snapshot taken when the listing was created; later
/// mutations are not observed. For [`PinType::All`] recursive roots come
/// first, then indirect pins, then direct roots that were not already
/// reported as indirect. Each digest appears at most once.
pub struct PinListing {
    state: Arc<PinState>,
    walker: DagWalker,
    pin_type: PinType,
    phase: Phase,
    /// Last member yielded from the explicit set being scanned.
    cursor: Option<Digest>,
    /// Recursive root whose subtree is being walked.
    current_root: Option<Digest>,
    walk: Option<Descendants>,
    emitted: HashSet<Digest>,
}

/// Smallest member strictly after `after`, or the first member.
fn next_after(set: &BTreeSet<Digest>, after: Option<Digest>) -> Option<Digest> {
    match after {
        Some(d) => set.range((Bound::Excluded(d), Bound::Unbounded)).next().copied(),
        None => set.first().copied(),
    }
}

impl PinListing {
    pub(crate) fn new(state: Arc<PinState>, walker: DagWalker, options: LsOptions) -> Self {
        let phase = match (options.digest, options.pin_type) {
            (Some(digest), _) => Phase::Lookup(digest),
            (None, PinType::All | PinType::Recursive) => Phase::Recursive,
            (None, PinType::Indirect) => Phase::Indirect,
            (None, PinType::Direct) => Phase::Direct,
        };
        Self {
            state,
            walker,
            pin_type: options.pin_type,
            phase,
            cursor: None,
            current_root: None,
            walk: None,
            emitted: HashSet::new(),
        }
    }

    /// Next entry, or `None` when the listing is exhausted.
    ///
    /// After an error the listing yields nothing more.
    pub async fn next(&mut self) -> PinResult<Option<PinEntry>> {
        match self.advance().await {
            Ok(entry) => Ok(entry),
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    fn finish(&mut self) {
        self.phase = Phase::Done;
        self.walk = None;
    }

    fn after(&mut self, all_next: Phase) {
        self.cursor = None;
        self.phase = if self.pin_type == PinType::All {
            all_next
        } else {
            Phase::Done
        };
    }

    async fn advance(&mut self) -> PinResult<Option<PinEntry>> {
        loop {
            match self.phase {
                Phase::Done => return Ok(None),
                Phase::Lookup(digest) => {
                    self.finish();
                    let answer = self.state.query(&self.walker, &digest, self.pin_type).await?;
                    return Ok(answer
                        .reason
                        .map(|reason| PinEntry::new(digest, reason.pin_type())));
                }
                Phase::Recursive => match next_after(&self.state.recursive, self.cursor) {
                    Some(root) => {
                        self.cursor = Some(root);
                        return Ok(Some(PinEntry::new(root, PinType::Recursive)));
                    }
                    None => self.after(Phase::Indirect),
                },
                Phase::Indirect => {
                    let Some(walk) = self.walk.as_mut() else {
                        match next_after(&self.state.recursive, self.current_root) {
                            Some(root) => {
                                self.current_root = Some(root);
                                self.walk = Some(self.walker.descendants_of(root));
                            }
                            None => self.after(Phase::Direct),
                        }
                        continue;
                    };
                    match walk.next().await? {
                        Some(digest) => {
                            let nested_root = self.state.recursive.contains(&digest);
                            if nested_root || !self.emitted.insert(digest) {
                                continue;
                            }
                            return Ok(Some(PinEntry::new(digest, PinType::Indirect)));
                        }
                        None => self.walk = None,
                    }
                }
                Phase::Direct => match next_after(&self.state.direct, self.cursor) {
                    Some(digest) => {
                        self.cursor = Some(digest);
                        if self.emitted.contains(&digest) {
                            continue;
                        }
                        return Ok(Some(PinEntry::new(digest, PinType::Direct)));
                    }
                    None => self.finish(),
                },
            }
        }
    }

    /// Drain the listing into a vector.
    pub async fn collect_all(mut self) -> PinResult<Vec<PinEntry>> {
        let mut out = Vec::new();
        while let Some(entry) = self.next().await? {
            out.push(entry);
        }
        Ok(out)
    }

    /// Adapt the cursor into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = PinResult<PinEntry>> + Send {
        futures::stream::try_unfold(self, |mut listing| async move {
            let next = listing.next().await?;
            Ok::<_, PinError>(next.map(|entry| (entry, listing)))
        })
    }
}

impl std::fmt::Debug for PinListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinListing")
            .field("pin_type", &self.pin_type)
            .field("phase", &self.phase)
            .field("emitted", &self.emitted.len())
            .finish_non_exhaustive()
    }
}

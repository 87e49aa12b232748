//! Immutable catalog snapshots and the holder that publishes them.
//!
//! A [`SnapshotPair`] couples a snapshot with the index built from it. The
//! pair is only ever replaced as a whole: [`SnapshotHolder::install`] swaps
//! one `Arc` for another, so readers see either the old pair or the new one.

use crate::index::AttributeIndex;
use crate::model::CatalogEntry;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// An ordered, versioned batch of catalog entries.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    sequence: u64,
    entries: Vec<Arc<CatalogEntry>>,
}

impl CatalogSnapshot {
    pub fn new(sequence: u64, entries: Vec<CatalogEntry>) -> Self {
        Self {
            sequence,
            entries: entries.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn entries(&self) -> &[Arc<CatalogEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A snapshot together with the index derived from it.
#[derive(Debug, Default)]
pub struct SnapshotPair {
    snapshot: CatalogSnapshot,
    index: AttributeIndex,
}

impl SnapshotPair {
    /// Build the index for `snapshot` and pair them up.
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        let index = AttributeIndex::build(&snapshot);
        Self { snapshot, index }
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn index(&self) -> &AttributeIndex {
        &self.index
    }

    pub fn sequence(&self) -> u64 {
        self.snapshot.sequence
    }
}

/// Owner of the live [`SnapshotPair`].
pub struct SnapshotHolder {
    current: ArcSwap<SnapshotPair>,
}

impl SnapshotHolder {
    /// A holder serving the empty pair (sequence 0).
    pub fn new() -> Self {
        Self::with_pair(SnapshotPair::default())
    }

    pub fn with_pair(pair: SnapshotPair) -> Self {
        Self {
            current: ArcSwap::from_pointee(pair),
        }
    }

    pub fn current(&self) -> Arc<SnapshotPair> {
        self.current.load_full()
    }

    pub fn install(&self, pair: SnapshotPair) {
        self.current.store(Arc::new(pair));
    }
}

impl Default for SnapshotHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SnapshotHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        f.debug_struct("SnapshotHolder")
            .field("sequence", &current.sequence())
            .field("entries", &current.snapshot().len())
            .finish()
    }
}

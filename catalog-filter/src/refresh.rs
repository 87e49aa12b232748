//! Catalog refresh with generation-based cancellation.
//!
//! Every call to [`RefreshCoordinator::refresh`] takes the next generation
//! number. A fetch is never interrupted; when it completes, its result is only
//! installed if no newer refresh has started in the meantime. The check and
//! the install share one critical section, so installs are ordered by
//! generation even when completions race.
//!
//! Installed snapshots are numbered separately from generations: each install
//! takes the served sequence number plus one, so superseded and failed
//! fetches leave no gaps.

use crate::error::RefreshError;
use crate::model::CatalogEntry;
use crate::model::validate_entries;
use crate::monitor::OP_FETCH;
use crate::monitor::OP_INDEX_BUILD;
use crate::monitor::OP_VALIDATE;
use crate::monitor::PerformanceMonitor;
use crate::snapshot::CatalogSnapshot;
use crate::snapshot::SnapshotHolder;
use crate::snapshot::SnapshotPair;
use crate::source::DataSource;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
    /// No refresh has been requested yet.
    Idle,
    Fetching,
    /// The latest refresh installed a snapshot.
    Ready,
    /// The latest refresh failed; the previous snapshot is still served.
    Failed,
}

impl RefreshPhase {
    pub fn is_idle(self) -> bool {
        !matches!(self, RefreshPhase::Fetching)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshStatus {
    pub phase: RefreshPhase,
    /// Latest generation requested.
    pub generation: u64,
    /// Sequence number of the snapshot currently served.
    pub installed_sequence: u64,
    pub last_error: Option<String>,
    pub last_rejected: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Installed {
        generation: u64,
        sequence: u64,
        accepted: usize,
        rejected: usize,
    },
    /// A newer refresh started before this one completed; its result was dropped.
    Superseded { generation: u64 },
}

#[derive(Debug)]
struct StatusInternal {
    phase: RefreshPhase,
    last_error: Option<String>,
    last_rejected: usize,
}

pub struct RefreshCoordinator {
    source: Arc<dyn DataSource>,
    holder: SnapshotHolder,
    monitor: Arc<PerformanceMonitor>,
    latest_generation: AtomicU64,
    commit_lock: Mutex<()>,
    status: Mutex<StatusInternal>,
}

impl RefreshCoordinator {
    pub fn new(
        source: Arc<dyn DataSource>,
        holder: SnapshotHolder,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            source,
            holder,
            monitor,
            latest_generation: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            status: Mutex::new(StatusInternal {
                phase: RefreshPhase::Idle,
                last_error: None,
                last_rejected: 0,
            }),
        }
    }

    pub fn holder(&self) -> &SnapshotHolder {
        &self.holder
    }

    pub fn into_holder(self) -> SnapshotHolder {
        self.holder
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest_generation.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> RefreshStatus {
        let status = lock(&self.status);
        RefreshStatus {
            phase: status.phase,
            generation: self.latest_generation(),
            installed_sequence: self.holder.current().sequence(),
            last_error: status.last_error.clone(),
            last_rejected: status.last_rejected,
        }
    }

    /// Fetch, validate, index and install a new catalog snapshot.
    ///
    /// Supersedes any refresh still in flight.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.mark_fetching(generation);

        let fetched = self
            .monitor
            .measure_async(OP_FETCH, self.source.fetch_catalog())
            .await;
        if !self.is_latest(generation) {
            debug!(
                generation,
                latest = self.latest_generation(),
                "discarding superseded catalog fetch"
            );
            return Ok(RefreshOutcome::Superseded { generation });
        }

        let raw = match fetched {
            Ok(raw) => raw,
            Err(err) => {
                warn!(generation, "catalog fetch failed: {err}");
                self.finish(generation, RefreshPhase::Failed, Some(err.to_string()), 0);
                return Err(err.into());
            }
        };

        let batch = self.monitor.time(OP_VALIDATE, || validate_entries(raw));
        for rejected in &batch.rejected {
            warn!(generation, "skipping catalog entry: {rejected}");
        }
        let accepted = batch.entries.len();
        let rejected = batch.rejected.len();
        if accepted == 0 && rejected > 0 {
            if !self.is_latest(generation) {
                return Ok(RefreshOutcome::Superseded { generation });
            }
            let err = RefreshError::AllEntriesRejected { rejected };
            self.finish(generation, RefreshPhase::Failed, Some(err.to_string()), rejected);
            return Err(err);
        }

        let Some((sequence, values)) = self.install_if_latest(generation, batch.entries) else {
            debug!(generation, "catalog superseded before install");
            return Ok(RefreshOutcome::Superseded { generation });
        };
        self.finish(generation, RefreshPhase::Ready, None, rejected);
        info!(
            generation,
            sequence,
            entries = accepted,
            rejected,
            values,
            "installed catalog snapshot"
        );
        Ok(RefreshOutcome::Installed {
            generation,
            sequence,
            accepted,
            rejected,
        })
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.latest_generation.load(Ordering::SeqCst) == generation
    }

    /// Build and install the pair for `generation` unless a newer refresh has
    /// started. Returns the installed sequence and the number of indexed values.
    fn install_if_latest(
        &self,
        generation: u64,
        entries: Vec<CatalogEntry>,
    ) -> Option<(u64, usize)> {
        let _commit = lock(&self.commit_lock);
        if !self.is_latest(generation) {
            return None;
        }
        let sequence = self.holder.current().sequence() + 1;
        let pair = self.monitor.time(OP_INDEX_BUILD, || {
            SnapshotPair::new(CatalogSnapshot::new(sequence, entries))
        });
        let values = pair.index().value_count();
        self.holder.install(pair);
        Some((sequence, values))
    }

    fn mark_fetching(&self, generation: u64) {
        let mut status = lock(&self.status);
        if status.phase == RefreshPhase::Fetching {
            debug!(generation, "superseding in-flight catalog fetch");
        }
        status.phase = RefreshPhase::Fetching;
    }

    fn finish(
        &self,
        generation: u64,
        phase: RefreshPhase,
        error: Option<String>,
        rejected: usize,
    ) {
        let mut status = lock(&self.status);
        if !self.is_latest(generation) {
            return;
        }
        status.phase = phase;
        status.last_error = error;
        status.last_rejected = rejected;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

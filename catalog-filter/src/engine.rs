use crate::coalescer::FilterCoalescer;
use crate::config::EngineConfig;
use crate::error::RefreshError;
use crate::error::Result;
use crate::index::Facet;
use crate::model::CatalogEntry;
use crate::monitor::OP_APPLY_FILTER;
use crate::monitor::OP_QUERY;
use crate::monitor::OP_REFRESH;
use crate::monitor::OperationMetrics;
use crate::monitor::PerformanceMonitor;
use crate::query::query;
use crate::refresh::RefreshCoordinator;
use crate::refresh::RefreshOutcome;
use crate::refresh::RefreshStatus;
use crate::selection::FilterSelection;
use crate::snapshot::SnapshotHolder;
use crate::snapshot::SnapshotPair;
use crate::source::DataSource;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// The result of the last effective query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogView {
    /// Sequence number of the snapshot the view was computed from.
    pub sequence: u64,
    pub selection: FilterSelection,
    pub entries: Vec<Arc<CatalogEntry>>,
}

impl CatalogView {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.id.as_str()).collect()
    }
}

/// Handle returned by [`CatalogEngine::on_view_changed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type ViewCallback = Arc<dyn Fn(&CatalogView) + Send + Sync>;

/// Facade tying the refresh coordinator, the filter coalescer and the query
/// engine together.
///
/// Cloning is cheap; every clone drives the same engine. Construction spawns
/// the coalescer task and therefore needs a running tokio runtime.
#[derive(Clone)]
pub struct CatalogEngine {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    refresher: RefreshCoordinator,
    monitor: Arc<PerformanceMonitor>,
    coalescer: FilterCoalescer,
    // Effective selection. Held for the whole view recomputation so the last
    // recomputation always sees the latest pair and the latest selection.
    selection: Mutex<FilterSelection>,
    view: watch::Sender<Arc<CatalogView>>,
    listeners: Mutex<Vec<(SubscriptionId, ViewCallback)>>,
    next_listener: AtomicU64,
}

impl CatalogEngine {
    pub fn new(config: EngineConfig, source: Arc<dyn DataSource>) -> Result<Self> {
        Self::with_holder(config, source, SnapshotHolder::new())
    }

    /// Start from an existing holder, e.g. one recovered with
    /// [`CatalogEngine::into_holder`].
    pub fn with_holder(
        config: EngineConfig,
        source: Arc<dyn DataSource>,
        holder: SnapshotHolder,
    ) -> Result<Self> {
        config.validate()?;
        let monitor = Arc::new(PerformanceMonitor::new(&config));
        let pair = holder.current();
        let initial = CatalogView {
            sequence: pair.sequence(),
            selection: FilterSelection::new(),
            entries: pair.snapshot().entries().to_vec(),
        };
        let (view, _) = watch::channel(Arc::new(initial));
        let refresher = RefreshCoordinator::new(source, holder, monitor.clone());
        let debounce = config.debounce();

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let coalescer = FilterCoalescer::spawn(debounce, move |selection| {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .monitor
                        .time(OP_APPLY_FILTER, || inner.apply_selection(selection));
                }
            });
            Inner {
                config,
                refresher,
                monitor,
                coalescer,
                selection: Mutex::new(FilterSelection::new()),
                view,
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }
        });
        Ok(Self { inner })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Replace the filter selection. The change takes effect once no further
    /// change arrives for the configured debounce window.
    pub fn set_filter(&self, selection: FilterSelection) {
        if !self.inner.coalescer.submit(selection) {
            debug!("ignoring filter change after shutdown");
        }
    }

    pub fn current_view(&self) -> Arc<CatalogView> {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogView>> {
        self.inner.view.subscribe()
    }

    /// Call `callback` with every new view. Callbacks run on the thread that
    /// produced the view and must not block.
    pub fn on_view_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CatalogView) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(callback)));
        id
    }

    pub fn remove_view_listener(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Reload the catalog. See [`RefreshCoordinator::refresh`].
    pub async fn refresh(&self) -> std::result::Result<RefreshOutcome, RefreshError> {
        let outcome = self
            .inner
            .monitor
            .measure_async(OP_REFRESH, self.inner.refresher.refresh())
            .await?;
        if matches!(outcome, RefreshOutcome::Installed { .. }) {
            let selection = lock(&self.inner.selection);
            self.inner.recompute_locked(&selection);
        }
        Ok(outcome)
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.inner.refresher.status()
    }

    /// Run a one-off query against the live pair without touching the
    /// effective selection.
    pub fn query(&self, selection: &FilterSelection) -> Vec<Arc<CatalogEntry>> {
        let pair = self.snapshot();
        self.inner
            .monitor
            .time(OP_QUERY, || query(pair.snapshot(), pair.index(), selection))
    }

    pub fn snapshot(&self) -> Arc<SnapshotPair> {
        self.inner.refresher.holder().current()
    }

    pub fn facets(&self) -> Vec<Facet> {
        self.snapshot().index().facets()
    }

    /// Rolling-average duration per operation name.
    pub fn metrics(&self) -> BTreeMap<String, Duration> {
        self.inner.monitor.averages()
    }

    pub fn metrics_report(&self) -> Vec<OperationMetrics> {
        self.inner.monitor.report()
    }

    /// Stop coalescing; a filter change still waiting for its window is
    /// dropped.
    pub fn shutdown(&self) {
        self.inner.coalescer.shutdown();
    }

    /// Hand back the snapshot holder. Fails with the engine itself while other
    /// clones are alive.
    pub fn into_holder(self) -> std::result::Result<SnapshotHolder, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => {
                inner.coalescer.shutdown();
                Ok(inner.refresher.into_holder())
            }
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl fmt::Debug for CatalogEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEngine")
            .field("config", &self.inner.config)
            .field("sequence", &self.snapshot().sequence())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn apply_selection(&self, selection: FilterSelection) {
        let mut current = lock(&self.selection);
        *current = selection;
        self.recompute_locked(&current);
    }

    fn recompute_locked(&self, selection: &FilterSelection) {
        let pair = self.refresher.holder().current();
        let unchanged = {
            let view = self.view.borrow();
            view.sequence == pair.sequence() && view.selection == *selection
        };
        if unchanged {
            return;
        }
        let entries = self
            .monitor
            .time(OP_QUERY, || query(pair.snapshot(), pair.index(), selection));
        let view = Arc::new(CatalogView {
            sequence: pair.sequence(),
            selection: selection.clone(),
            entries,
        });
        debug!(
            sequence = view.sequence,
            values = selection.len(),
            entries = view.len(),
            "catalog view changed"
        );
        self.view.send_replace(view.clone());

        let listeners: Vec<ViewCallback> = lock(&self.listeners)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in listeners {
            callback(&view);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawEntry;
    use crate::source::StaticSource;
    use pretty_assertions::assert_eq;

    fn engine() -> CatalogEngine {
        let source = StaticSource::new(vec![
            RawEntry::new("1", "Tee", 10.0).with_sizes(["S", "M"]),
            RawEntry::new("2", "Hoodie", 20.0).with_sizes(["M"]),
        ]);
        CatalogEngine::new(EngineConfig::default(), Arc::new(source)).unwrap()
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let config = EngineConfig {
            metrics_window: 0,
            ..Default::default()
        };
        let source = Arc::new(StaticSource::new(Vec::new()));
        assert!(CatalogEngine::new(config, source).is_err());
    }

    #[tokio::test]
    async fn removed_listener_is_not_called() {
        let engine = engine();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let id = engine.on_view_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.refresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(engine.remove_view_listener(id));
        assert!(!engine.remove_view_listener(id));
        engine.inner.apply_selection(["M"].into_iter().collect());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unchanged_inputs_do_not_republish() {
        let engine = engine();
        engine.refresh().await.unwrap();
        let mut views = engine.subscribe();
        views.mark_unchanged();

        engine.inner.apply_selection(FilterSelection::new());
        assert!(!views.has_changed().unwrap());

        engine.inner.apply_selection(["S"].into_iter().collect());
        assert!(views.has_changed().unwrap());
        assert_eq!(views.borrow_and_update().ids(), vec!["1"]);
    }

    #[tokio::test]
    async fn one_off_query_leaves_view_alone() {
        let engine = engine();
        engine.refresh().await.unwrap();

        let hits = engine.query(&["M"].into_iter().collect());
        assert_eq!(hits.len(), 2);
        assert_eq!(engine.current_view().selection, FilterSelection::new());
        assert_eq!(
            engine.facets(),
            vec![
                Facet {
                    value: "M".into(),
                    count: 2,
                },
                Facet {
                    value: "S".into(),
                    count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn holder_survives_engine() {
        let engine = engine();
        engine.refresh().await.unwrap();

        let clone = engine.clone();
        let engine = engine.into_holder().unwrap_err();
        drop(clone);

        let holder = engine.into_holder().unwrap();
        assert_eq!(holder.current().sequence(), 1);

        let source = Arc::new(StaticSource::new(Vec::new()));
        let restarted = CatalogEngine::with_holder(EngineConfig::default(), source, holder).unwrap();
        assert_eq!(restarted.current_view().ids(), vec!["1", "2"]);
        assert_eq!(restarted.current_view().sequence, 1);
    }
}

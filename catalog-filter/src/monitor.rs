//! Best-effort timing of named engine operations.
//!
//! The monitor only observes: it records `(name, duration, success)` samples,
//! keeps a rolling average per name and warns about slow samples. Nothing it
//! does can fail the operation it wraps.

use crate::config::EngineConfig;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::Instant;
use tracing::warn;

pub const OP_REFRESH: &str = "refresh";
pub const OP_FETCH: &str = "refresh.fetch";
pub const OP_VALIDATE: &str = "refresh.validate";
pub const OP_INDEX_BUILD: &str = "index.build";
pub const OP_QUERY: &str = "query";
pub const OP_APPLY_FILTER: &str = "filter.apply";

/// Aggregated samples for one operation name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OperationMetrics {
    pub name: String,
    pub samples: u64,
    pub failures: u64,
    pub slow: u64,
    pub average: Duration,
    pub last: Duration,
}

#[derive(Debug, Default)]
struct OperationWindow {
    recent: VecDeque<Duration>,
    samples: u64,
    failures: u64,
    slow: u64,
    last: Duration,
}

impl OperationWindow {
    fn average(&self) -> Duration {
        if self.recent.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.recent.iter().sum();
        total / self.recent.len() as u32
    }
}

pub struct PerformanceMonitor {
    enabled: bool,
    window: usize,
    slow_threshold: Duration,
    operations: Mutex<HashMap<String, OperationWindow>>,
}

impl PerformanceMonitor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            enabled: config.metrics_enabled,
            window: config.metrics_window.max(1),
            slow_threshold: config.slow_operation_threshold(),
            operations: Mutex::new(HashMap::new()),
        }
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Time a fallible operation; `Err` counts as a failed sample.
    pub fn measure<T, E>(&self, name: &str, op: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let start = Instant::now();
        let result = op();
        self.record(name, start.elapsed(), result.is_ok());
        result
    }

    /// Time an operation that cannot fail.
    pub fn time<T>(&self, name: &str, op: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = op();
        self.record(name, start.elapsed(), true);
        value
    }

    pub async fn measure_async<T, E, F>(&self, name: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record(name, start.elapsed(), result.is_ok());
        result
    }

    pub fn record(&self, name: &str, duration: Duration, success: bool) {
        if !self.enabled {
            return;
        }
        let slow = duration > self.slow_threshold;
        {
            let mut operations = self.lock();
            let window = operations.entry(name.to_string()).or_default();
            window.samples = window.samples.saturating_add(1);
            if !success {
                window.failures = window.failures.saturating_add(1);
            }
            if slow {
                window.slow = window.slow.saturating_add(1);
            }
            window.last = duration;
            window.recent.push_back(duration);
            while window.recent.len() > self.window {
                window.recent.pop_front();
            }
        }
        if slow {
            warn!(
                operation = name,
                elapsed_ms = duration.as_millis() as u64,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                success,
                "slow catalog operation"
            );
        }
    }

    /// Rolling-average duration per operation name.
    pub fn averages(&self) -> BTreeMap<String, Duration> {
        self.lock()
            .iter()
            .map(|(name, window)| (name.clone(), window.average()))
            .collect()
    }

    pub fn report(&self) -> Vec<OperationMetrics> {
        let mut report: Vec<OperationMetrics> = self
            .lock()
            .iter()
            .map(|(name, window)| OperationMetrics {
                name: name.clone(),
                samples: window.samples,
                failures: window.failures,
                slow: window.slow,
                average: window.average(),
                last: window.last,
            })
            .collect();
        report.sort();
        report
    }

    // A panic while the lock was held only ever interrupts bookkeeping, so a
    // poisoned map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, OperationWindow>> {
        match self.operations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn monitor(window: usize) -> PerformanceMonitor {
        PerformanceMonitor::new(&EngineConfig {
            metrics_window: window,
            ..Default::default()
        })
    }

    #[test]
    fn rolling_average_covers_last_window() {
        let monitor = monitor(2);
        monitor.record(OP_QUERY, Duration::from_millis(10), true);
        monitor.record(OP_QUERY, Duration::from_millis(20), true);
        monitor.record(OP_QUERY, Duration::from_millis(40), true);

        let averages = monitor.averages();
        assert_eq!(averages.get(OP_QUERY), Some(&Duration::from_millis(30)));
        let report = monitor.report();
        assert_eq!(report[0].samples, 3);
        assert_eq!(report[0].last, Duration::from_millis(40));
    }

    #[test]
    fn failures_and_slow_samples_are_counted() {
        let monitor = monitor(8);
        monitor.record(OP_FETCH, Duration::from_millis(150), false);
        monitor.record(OP_FETCH, Duration::from_millis(5), true);

        let report = monitor.report();
        assert_eq!(
            report,
            vec![OperationMetrics {
                name: OP_FETCH.to_string(),
                samples: 2,
                failures: 1,
                slow: 1,
                average: Duration::from_micros(77_500),
                last: Duration::from_millis(5),
            }]
        );
    }

    #[test]
    fn measure_returns_wrapped_result_untouched() {
        let monitor = monitor(8);
        let ok: Result<u32, String> = monitor.measure(OP_VALIDATE, || Ok(7));
        let err: Result<u32, String> = monitor.measure(OP_VALIDATE, || Err("bad".to_string()));
        assert_eq!(ok, Ok(7));
        assert_eq!(err, Err("bad".to_string()));
        assert_eq!(monitor.report()[0].failures, 1);
    }

    #[test]
    fn poisoned_lock_does_not_propagate() {
        let monitor = std::sync::Arc::new(monitor(8));
        let poisoner = monitor.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.operations.lock();
            panic!("poison the metrics lock");
        })
        .join();

        assert_eq!(monitor.time(OP_QUERY, || 42), 42);
        assert_eq!(monitor.report()[0].samples, 1);
    }

    #[test]
    fn disabled_monitor_records_nothing() {
        let monitor = PerformanceMonitor::new(&EngineConfig {
            metrics_enabled: false,
            ..Default::default()
        });
        monitor.record(OP_QUERY, Duration::from_millis(1), true);
        assert!(monitor.averages().is_empty());
    }
}

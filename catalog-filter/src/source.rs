use crate::error::FetchError;
use crate::model::RawEntry;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Where catalog batches come from. Transport, retries and timeouts are the
/// implementation's business.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<RawEntry>, FetchError>;
}

/// In-memory source with optional scripted responses.
///
/// Scripted responses are consumed in order; once they run out every fetch
/// returns the default entries immediately.
pub struct StaticSource {
    entries: Vec<RawEntry>,
    scripted: Mutex<VecDeque<ScriptedFetch>>,
}

struct ScriptedFetch {
    delay: Duration,
    result: Result<Vec<RawEntry>, FetchError>,
}

impl StaticSource {
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self {
            entries,
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue the outcome of a future fetch, delivered after `delay`.
    pub fn push_response(&self, delay: Duration, result: Result<Vec<RawEntry>, FetchError>) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.push_back(ScriptedFetch { delay, result });
        }
    }

    fn next_scripted(&self) -> Option<ScriptedFetch> {
        self.scripted.lock().ok()?.pop_front()
    }
}

#[async_trait]
impl DataSource for StaticSource {
    async fn fetch_catalog(&self) -> Result<Vec<RawEntry>, FetchError> {
        match self.next_scripted() {
            Some(fetch) => {
                if !fetch.delay.is_zero() {
                    tokio::time::sleep(fetch.delay).await;
                }
                fetch.result
            }
            None => Ok(self.entries.clone()),
        }
    }
}

/// Reads a JSON catalog file on every fetch.
///
/// The file holds either an array of entries or an object with an `entries`
/// array.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    async fn fetch_catalog(&self) -> Result<Vec<RawEntry>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let entries = parse_catalog(&content)?;
        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "read catalog file"
        );
        Ok(entries)
    }
}

/// Split a catalog document into raw entries without validating them.
pub fn parse_catalog(content: &str) -> Result<Vec<RawEntry>, FetchError> {
    let document: Value = serde_json::from_str(content)?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("entries") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(FetchError::Payload(
                    "expected an `entries` array".to_string(),
                ));
            }
        },
        _ => {
            return Err(FetchError::Payload(
                "expected a JSON array of entries".to_string(),
            ));
        }
    };
    Ok(items.into_iter().map(RawEntry::from_value).collect())
}

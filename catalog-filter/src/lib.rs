/*!
# Catalog Filter

In-memory attribute filtering for a product catalog that is reloaded from a
slow, fallible data source.

## Features

- **Atomic snapshots**: every reload installs a new (snapshot, index) pair in one swap
- **Inverted index**: conjunctive attribute queries in time proportional to the posting lists
- **Superseded reloads**: a slow fetch never overwrites the result of a newer one
- **Coalesced filtering**: bursts of filter changes collapse into one query
- **Operation timing**: rolling averages and slow-operation warnings

## Example

```rust,no_run
use catalog_filter::{CatalogEngine, EngineConfig, FilterSelection, JsonFileSource};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let source = Arc::new(JsonFileSource::new("catalog.json"));
    let engine = CatalogEngine::new(EngineConfig::default(), source)?;
    engine.refresh().await?;

    let mut views = engine.subscribe();
    engine.set_filter(["M", "L"].into_iter().collect::<FilterSelection>());
    views.changed().await?;

    for entry in &views.borrow().entries {
        println!("{} {}", entry.id, entry.title);
    }
    Ok(())
}
```
*/

mod coalescer;
mod config;
mod engine;
mod error;
mod index;
mod model;
mod monitor;
mod query;
mod refresh;
mod selection;
mod snapshot;
mod source;

pub use coalescer::{ApplyFn, FilterCoalescer};
pub use config::EngineConfig;
pub use engine::{CatalogEngine, CatalogView, SubscriptionId, ViewCallback};
pub use error::{EngineError, FetchError, RefreshError, Result, ValidationError};
pub use index::{AttributeIndex, Facet};
pub use model::{AttributeValue, CatalogEntry, RawEntry, ValidatedBatch, validate_entries};
pub use monitor::{
    OP_APPLY_FILTER, OP_FETCH, OP_INDEX_BUILD, OP_QUERY, OP_REFRESH, OP_VALIDATE,
    OperationMetrics, PerformanceMonitor,
};
pub use query::{QueryMode, matching_positions, query, query_with_mode};
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshPhase, RefreshStatus};
pub use selection::FilterSelection;
pub use snapshot::{CatalogSnapshot, SnapshotHolder, SnapshotPair};
pub use source::{DataSource, JsonFileSource, StaticSource, parse_catalog};

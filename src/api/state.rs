use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::ledger::{LedgerSchema, LedgerStore};
use crate::model::Symbol;
use crate::pipeline::Pipeline;
use crate::volatility::LedgerSeries;

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub pipeline: Pipeline,
    /// Parsed ledgers served by the read endpoints. Dropped per symbol on
    /// every successful commit.
    pub series_cache: Mutex<TtlCache<Symbol, LedgerSeries>>,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, schema: LedgerSchema, cache_ttl: Duration) -> Self {
        Self::with_clock(store, schema, cache_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn LedgerStore>,
        schema: LedgerSchema,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pipeline: Pipeline::new(store, schema),
                series_cache: Mutex::new(TtlCache::new(cache_ttl, clock)),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        self.inner.pipeline.store()
    }
}

mod availability;
mod cache;
mod conflict;
mod error;
mod lifecycle;
mod queries;

pub use availability::disabled_dates;
pub use conflict::ClearedRange;
pub use error::EngineError;

use std::future::Future;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::model::RoomId;
use crate::store::{BookingStore, StoreError};

use cache::AvailabilityCache;
use error::{read_error, write_error};

/// Availability, validation and booking lifecycle over a [`BookingStore`].
///
/// Holds no booking state of its own: every answer is re-fetched from the
/// store, except what the optional availability cache serves.
pub struct Engine {
    store: Arc<dyn BookingStore>,
    config: EngineConfig,
    cache: Option<AvailabilityCache>,
}

impl Engine {
    pub fn new(store: Arc<dyn BookingStore>, config: EngineConfig) -> Self {
        let cache = config.availability_cache_ttl.map(AvailabilityCache::new);
        Self {
            store,
            config,
            cache,
        }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a store call under the configured timeout. `None` means it timed out.
    pub(super) async fn timed<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Option<Result<T, StoreError>> {
        let start = std::time::Instant::now();
        let result = tokio::time::timeout(self.config.store_timeout, call).await;
        metrics::histogram!(crate::observability::STORE_CALL_DURATION_SECONDS, "op" => op)
            .record(start.elapsed().as_secs_f64());
        match result {
            Ok(r) => Some(r),
            Err(_) => {
                metrics::counter!(crate::observability::STORE_TIMEOUTS_TOTAL, "op" => op)
                    .increment(1);
                tracing::warn!("store call {op} timed out after {:?}", self.config.store_timeout);
                None
            }
        }
    }

    pub(super) async fn read<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, EngineError> {
        match self.timed(op, call).await {
            Some(result) => result.map_err(read_error),
            None => Err(EngineError::DataUnavailable(format!("{op} timed out"))),
        }
    }

    pub(super) async fn write<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, EngineError> {
        match self.timed(op, call).await {
            Some(result) => result.map_err(write_error),
            None => Err(EngineError::WriteFailed(format!("{op} timed out"))),
        }
    }

    /// Drop cached availability after a successful write to the room.
    pub(super) fn invalidate(&self, room_id: &RoomId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(room_id);
        }
    }
}

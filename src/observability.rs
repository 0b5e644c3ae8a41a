use std::net::SocketAddr;

use crate::engine::EngineError;

// ── Booking flow ────────────────────────────────────────────────

/// Counter: bookings persisted as pending.
pub const BOOKINGS_REQUESTED_TOTAL: &str = "roombook_bookings_requested_total";

/// Counter: validation rejections. Labels: reason.
pub const VALIDATION_REJECTIONS_TOTAL: &str = "roombook_validation_rejections_total";

/// Counter: administrative transitions. Labels: status.
pub const STATUS_TRANSITIONS_TOTAL: &str = "roombook_status_transitions_total";

// ── Store & availability ────────────────────────────────────────

/// Histogram: store call latency in seconds. Labels: op.
pub const STORE_CALL_DURATION_SECONDS: &str = "roombook_store_call_duration_seconds";

/// Counter: store calls that hit the timeout. Labels: op.
pub const STORE_TIMEOUTS_TOTAL: &str = "roombook_store_timeouts_total";

/// Counter: availability served from the per-room cache.
pub const AVAILABILITY_CACHE_HITS_TOTAL: &str = "roombook_availability_cache_hits_total";

/// Counter: availability recomputed from the store.
pub const AVAILABILITY_CACHE_MISSES_TOTAL: &str = "roombook_availability_cache_misses_total";

// ── WAL ─────────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roombook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roombook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a rejection reason.
pub fn rejection_label(err: &EngineError) -> &'static str {
    match err {
        EngineError::InvalidRange(_) => "invalid_range",
        EngineError::Conflict(_) => "conflict",
        EngineError::NotFound(_) => "not_found",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::DataUnavailable(_) => "data_unavailable",
        EngineError::WriteFailed(_) => "write_failed",
        EngineError::AlreadyExists(_) => "already_exists",
        EngineError::Forbidden(_) => "forbidden",
        EngineError::InvalidTransition { .. } => "invalid_transition",
    }
}

use std::sync::Arc;

use tracing::info;

use roombook::config::Config;
use roombook::engine::Engine;
use roombook::identity::Identity;
use roombook::model::BookingCounts;
use roombook::store::WalStore;

/// Open the booking store, report per-room state, compact the WAL if due.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    roombook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.wal_path();
    let store = Arc::new(WalStore::open(&wal_path)?);
    let engine = Engine::new(store.clone(), config.engine.clone());

    info!("roombook store at {}", wal_path.display());
    info!("  store_timeout: {:?}", config.engine.store_timeout);
    info!(
        "  availability cache: {}",
        config
            .engine
            .availability_cache_ttl
            .map_or("disabled".to_string(), |ttl| format!("{ttl:?}"))
    );

    let overall = engine.booking_counts(&Identity::admin("roombook")).await?;
    info!(
        "bookings: {} total, {} pending, {} approved, {} rejected",
        overall.total, overall.pending, overall.approved, overall.rejected
    );

    for room in engine.list_rooms().await? {
        let bookings = engine.bookings_for_room(room.id, None).await?;
        let counts = BookingCounts::from_bookings(&bookings);
        let disabled = engine.compute_disabled_dates(room.id).await?;
        let window = match (disabled.first(), disabled.last()) {
            (Some(first), Some(last)) => format!("{first}..={last}"),
            _ => "none".to_string(),
        };
        info!(
            "room {} ({}): {} pending, {} approved, {} disabled dates ({window})",
            room.id,
            room.name,
            counts.pending,
            counts.approved,
            disabled.len()
        );
    }

    if store.compact_if_needed(config.compact_threshold).await? {
        info!("WAL compacted");
    }

    Ok(())
}

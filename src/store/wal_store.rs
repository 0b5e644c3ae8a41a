use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::info;

use crate::model::*;
use crate::wal::Wal;

use super::{
    BookingStore, InMemoryStore, StoreError, check_new_booking, check_new_room, check_transition,
};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends.
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush so partially buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// Durable store: in-memory state rebuilt from a WAL on open.
///
/// Every mutation is appended to the WAL while the affected room's write lock
/// is held, then applied. A failed append leaves the state untouched. The
/// append and the apply run in a spawned task, so a caller that stops waiting
/// (a timeout, a dropped future) cannot leave the WAL ahead of memory.
pub struct WalStore {
    shared: Arc<Shared>,
    path: PathBuf,
}

struct Shared {
    inner: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Serializes room creation so duplicate ids never reach the WAL.
    /// Compaction holds it too, so no room appears mid-snapshot.
    catalog: Mutex<()>,
}

impl WalStore {
    /// Replay `path` and start the writer task. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let inner = InMemoryStore::new();
        let mut skipped = 0usize;
        for event in &events {
            if let Err(e) = apply_replayed(&inner, event) {
                tracing::warn!("replay: skipping {}: {e}", event_label(event));
                skipped += 1;
            }
        }
        info!(
            "replayed {} events from {} ({} rooms, {skipped} skipped)",
            events.len(),
            path.display(),
            inner.room_count()
        );

        Ok(Self {
            shared: Arc::new(Shared {
                inner,
                wal_tx,
                catalog: Mutex::new(()),
            }),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a mutation to completion on its own task, however the caller fares.
    async fn commit<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(Arc<Shared>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(op(self.shared.clone()))
            .await
            .map_err(|e| StoreError::Io(format!("commit task failed: {e}")))?
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    ///
    /// Holds the catalog lock and every room's write lock until the new file
    /// is in place, so no acknowledged write can land in the discarded log.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let count = self.commit(|shared| async move { shared.compact().await }).await?;
        info!("compacted {} to {count} events", self.path.display());
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .shared
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Compact when at least `threshold` appends happened since the last one.
    pub async fn compact_if_needed(&self, threshold: u64) -> Result<bool, StoreError> {
        let appends = self.appends_since_compact().await;
        if appends < threshold {
            return Ok(false);
        }
        self.compact().await?;
        Ok(true)
    }
}

impl Shared {
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Io("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Io("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        check_new_room(&room)?;
        let _catalog = self.catalog.lock().await;
        if self.inner.contains_room(&room.id) {
            return Err(StoreError::AlreadyExists(room.id));
        }
        self.wal_append(&Event::RoomCreated { room: room.clone() })
            .await?;
        self.inner.add_room(room)
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        let mut guard = self.inner.room_write(&booking.room_id).await?;
        check_new_booking(&guard, &booking)?;
        self.inner.check_booking_id(&booking.id)?;
        let event = Event::BookingRequested { booking };
        self.wal_append(&event).await?;
        self.inner.apply_event(&mut guard, &event);
        Ok(())
    }

    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        status: BookingStatus,
    ) -> Result<Booking, StoreError> {
        let (room_id, mut guard) = self.inner.resolve_booking_write(&id).await?;
        check_transition(&guard, &id, expected, status)?;
        let event = Event::BookingStatusChanged { id, room_id, status };
        self.wal_append(&event).await?;
        self.inner.apply_event(&mut guard, &event);
        guard.get_booking(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn compact(&self) -> Result<usize, StoreError> {
        // Lock order: catalog, then rooms. Mutations take at most one of each.
        let _catalog = self.catalog.lock().await;
        let mut guards = Vec::new();
        for rs in self.inner.room_states() {
            guards.push(rs.write_owned().await);
        }

        let mut events = Vec::new();
        for guard in &guards {
            events.push(Event::RoomCreated {
                room: guard.room.clone(),
            });
            // Bookings carry their current status, so no status events are needed.
            for booking in &guard.bookings {
                events.push(Event::BookingRequested {
                    booking: booking.clone(),
                });
            }
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Io("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Io("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Io(e.to_string()))?;
        drop(guards);
        Ok(count)
    }
}

fn event_label(event: &Event) -> String {
    match event {
        Event::RoomCreated { room } => format!("room {}", room.id),
        Event::BookingRequested { booking } => format!("booking {}", booking.id),
        Event::BookingStatusChanged { id, status, .. } => format!("booking {id} -> {status}"),
    }
}

/// Apply one replayed event after the same checks a live write passes.
/// A log written by an older build may hold events that would now be refused.
fn apply_replayed(inner: &InMemoryStore, event: &Event) -> Result<(), StoreError> {
    let room_id = match event {
        Event::RoomCreated { room } => return inner.add_room(room.clone()),
        Event::BookingRequested { booking } => booking.room_id,
        Event::BookingStatusChanged { room_id, .. } => *room_id,
    };
    let rs = inner
        .get_room_state(&room_id)
        .ok_or(StoreError::NotFound(room_id))?;
    // Sole owner of every room lock here, so try_write always succeeds.
    // Never use blocking_write: open may be called from async code.
    let mut guard = rs
        .try_write()
        .map_err(|_| StoreError::Io(format!("room {room_id} locked during replay")))?;

    match event {
        Event::BookingRequested { booking } => {
            check_new_booking(&guard, booking)?;
            inner.check_booking_id(&booking.id)?;
            if booking.is_approved()
                && let Some(other) = guard
                    .overlapping(&booking.span)
                    .find(|b| b.is_approved())
            {
                return Err(StoreError::Exclusion(other.id));
            }
        }
        Event::BookingStatusChanged { id, status, .. } => {
            check_transition(&guard, id, BookingStatus::Pending, *status)?;
        }
        Event::RoomCreated { .. } => {}
    }
    inner.apply_event(&mut guard, event);
    Ok(())
}

#[async_trait]
impl BookingStore for WalStore {
    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        self.shared.inner.get_room(id).await
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.shared.inner.list_rooms().await
    }

    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        self.commit(|shared| async move { shared.insert_room(room).await })
            .await
    }

    async fn bookings_for_room(
        &self,
        room_id: RoomId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        self.shared.inner.bookings_for_room(room_id, status).await
    }

    async fn overlapping_bookings(
        &self,
        room_id: RoomId,
        status: BookingStatus,
        span: DateSpan,
    ) -> Result<Vec<Booking>, StoreError> {
        self.shared
            .inner
            .overlapping_bookings(room_id, status, span)
            .await
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        self.shared.inner.get_booking(id).await
    }

    async fn list_bookings(&self, requester: Option<&str>) -> Result<Vec<Booking>, StoreError> {
        self.shared.inner.list_bookings(requester).await
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.commit(|shared| async move { shared.insert_booking(booking).await })
            .await
    }

    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        status: BookingStatus,
    ) -> Result<Booking, StoreError> {
        self.commit(|shared| async move { shared.update_status(id, expected, status).await })
            .await
    }
}

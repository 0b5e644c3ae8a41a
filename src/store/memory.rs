use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::limits::*;
use crate::model::*;

use super::{BookingStore, StoreError, check_new_booking, check_new_room, check_transition};

pub type SharedRoomState = Arc<RwLock<RoomState>>;

pub struct InMemoryStore {
    rooms: DashMap<RoomId, SharedRoomState>,
    /// Reverse lookup: booking id → room id
    booking_to_room: DashMap<BookingId, RoomId>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            booking_to_room: DashMap::new(),
        }
    }

    // ── Room index ───────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get_room_state(&self, id: &RoomId) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    /// Snapshot of every room handle; never hold DashMap guards across awaits.
    pub(crate) fn room_states(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    pub(crate) fn add_room(&self, room: Room) -> Result<(), StoreError> {
        if self.rooms.len() >= MAX_ROOMS {
            return Err(StoreError::LimitExceeded("too many rooms"));
        }
        match self.rooms.entry(room.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(room.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(RoomState::new(room))));
                Ok(())
            }
        }
    }

    pub(crate) fn contains_room(&self, id: &RoomId) -> bool {
        self.rooms.contains_key(id)
    }

    /// Booking ids are unique across every room.
    pub(crate) fn check_booking_id(&self, id: &BookingId) -> Result<(), StoreError> {
        if self.booking_to_room.contains_key(id) {
            return Err(StoreError::AlreadyExists(*id));
        }
        Ok(())
    }

    // ── Locking ─────────────────────────────────────────────

    pub(crate) async fn room_write(
        &self,
        room_id: &RoomId,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, StoreError> {
        let rs = self
            .get_room_state(room_id)
            .ok_or(StoreError::NotFound(*room_id))?;
        Ok(rs.write_owned().await)
    }

    /// Lookup booking → room, acquire the room's write lock.
    pub(crate) async fn resolve_booking_write(
        &self,
        id: &BookingId,
    ) -> Result<(RoomId, OwnedRwLockWriteGuard<RoomState>), StoreError> {
        let room_id = self
            .booking_to_room
            .get(id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(*id))?;
        let guard = self.room_write(&room_id).await?;
        Ok((room_id, guard))
    }

    // ── Event application ────────────────────────────────────

    /// Apply a booking event to a room the caller holds locked.
    pub(crate) fn apply_event(&self, rs: &mut RoomState, event: &Event) {
        match event {
            Event::BookingRequested { booking } => {
                self.booking_to_room.insert(booking.id, booking.room_id);
                rs.insert_booking(booking.clone());
            }
            Event::BookingStatusChanged { id, status, .. } => {
                rs.set_status(id, *status);
            }
            // Room creation happens at the map level, not here
            Event::RoomCreated { .. } => {}
        }
    }

    fn booking_after_change(rs: &RoomState, id: &BookingId) -> Result<Booking, StoreError> {
        rs.get_booking(id).cloned().ok_or(StoreError::NotFound(*id))
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        match self.get_room_state(&id) {
            Some(rs) => Ok(Some(rs.read().await.room.clone())),
            None => Ok(None),
        }
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let mut rooms = Vec::with_capacity(self.rooms.len());
        for rs in self.room_states() {
            rooms.push(rs.read().await.room.clone());
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rooms)
    }

    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        check_new_room(&room)?;
        self.add_room(room)
    }

    async fn bookings_for_room(
        &self,
        room_id: RoomId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let Some(rs) = self.get_room_state(&room_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        Ok(guard
            .bookings
            .iter()
            .filter(|b| status.is_none_or(|s| b.status == s))
            .cloned()
            .collect())
    }

    async fn overlapping_bookings(
        &self,
        room_id: RoomId,
        status: BookingStatus,
        span: DateSpan,
    ) -> Result<Vec<Booking>, StoreError> {
        let Some(rs) = self.get_room_state(&room_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        Ok(guard
            .overlapping(&span)
            .filter(|b| b.status == status)
            .cloned()
            .collect())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let Some(room_id) = self.booking_to_room.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let Some(rs) = self.get_room_state(&room_id) else {
            return Ok(None);
        };
        let guard = rs.read().await;
        Ok(guard.get_booking(&id).cloned())
    }

    async fn list_bookings(&self, requester: Option<&str>) -> Result<Vec<Booking>, StoreError> {
        let mut bookings = Vec::new();
        for rs in self.room_states() {
            let guard = rs.read().await;
            bookings.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| requester.is_none_or(|r| b.requester_id == r))
                    .cloned(),
            );
        }
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        let mut guard = self.room_write(&booking.room_id).await?;
        check_new_booking(&guard, &booking)?;
        self.check_booking_id(&booking.id)?;
        self.apply_event(&mut guard, &Event::BookingRequested { booking });
        Ok(())
    }

    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        status: BookingStatus,
    ) -> Result<Booking, StoreError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        check_transition(&guard, &id, expected, status)?;
        let event = Event::BookingStatusChanged { id, room_id, status };
        self.apply_event(&mut guard, &event);
        Self::booking_after_change(&guard, &id)
    }
}

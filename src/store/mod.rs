//! Persistent booking store collaborator.
//!
//! The engine treats the store as the single source of truth and reaches it
//! only through [`BookingStore`]. Two implementations ship with the crate:
//! [`InMemoryStore`] and the durable [`WalStore`].

mod memory;
mod wal_store;

pub use memory::{InMemoryStore, SharedRoomState};
pub use wal_store::WalStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    /// The store could not be reached or answered with garbage.
    Unavailable(String),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Approving would overlap this already-approved booking.
    Exclusion(BookingId),
    /// Compare-and-set on the status failed.
    StatusMismatch {
        id: BookingId,
        actual: BookingStatus,
    },
    /// Check-in is not strictly before check-out.
    InvalidSpan(DateSpan),
    LimitExceeded(&'static str),
    Io(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            StoreError::Exclusion(id) => {
                write!(f, "exclusion violated by approved booking: {id}")
            }
            StoreError::StatusMismatch { id, actual } => {
                write!(f, "booking {id} is {actual}")
            }
            StoreError::InvalidSpan(span) => write!(f, "invalid span: {span}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError>;

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;

    async fn insert_room(&self, room: Room) -> Result<(), StoreError>;

    /// Bookings of a room, optionally restricted to one status.
    async fn bookings_for_room(
        &self,
        room_id: RoomId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Bookings of a room in `status` with `check_in < span.check_out` and
    /// `check_out > span.check_in`.
    async fn overlapping_bookings(
        &self,
        room_id: RoomId,
        status: BookingStatus,
        span: DateSpan,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// All bookings, newest first; only those of `requester` if given.
    async fn list_bookings(&self, requester: Option<&str>) -> Result<Vec<Booking>, StoreError>;

    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError>;

    /// Move a booking from `expected` to `status` atomically.
    ///
    /// Moving to `Approved` fails with [`StoreError::Exclusion`] when another
    /// approved booking of the same room overlaps.
    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        status: BookingStatus,
    ) -> Result<Booking, StoreError>;
}

// ── Checks shared by the store implementations ───────────────────

pub(crate) fn check_new_room(room: &Room) -> Result<(), StoreError> {
    if room.name.len() > MAX_NAME_LEN {
        return Err(StoreError::LimitExceeded("room name too long"));
    }
    if room.description.len() > MAX_DESCRIPTION_LEN {
        return Err(StoreError::LimitExceeded("room description too long"));
    }
    Ok(())
}

pub(crate) fn check_new_booking(rs: &RoomState, booking: &Booking) -> Result<(), StoreError> {
    if rs.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
        return Err(StoreError::LimitExceeded("too many bookings on room"));
    }
    if booking.requester_id.len() > MAX_REQUESTER_ID_LEN {
        return Err(StoreError::LimitExceeded("requester id too long"));
    }
    if DateSpan::checked(booking.span.check_in, booking.span.check_out).is_none() {
        return Err(StoreError::InvalidSpan(booking.span));
    }
    if rs.get_booking(&booking.id).is_some() {
        return Err(StoreError::AlreadyExists(booking.id));
    }
    Ok(())
}

/// Validate a status change against the room state the caller holds locked.
pub(crate) fn check_transition(
    rs: &RoomState,
    id: &BookingId,
    expected: BookingStatus,
    status: BookingStatus,
) -> Result<(), StoreError> {
    let booking = rs.get_booking(id).ok_or(StoreError::NotFound(*id))?;
    if booking.status != expected {
        return Err(StoreError::StatusMismatch {
            id: *id,
            actual: booking.status,
        });
    }
    if status == BookingStatus::Approved
        && let Some(other) = rs
            .overlapping(&booking.span)
            .find(|b| b.id != *id && b.is_approved())
    {
        return Err(StoreError::Exclusion(other.id));
    }
    Ok(())
}

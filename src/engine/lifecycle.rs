use chrono::{NaiveDate, Utc};
use tracing::info;
use ulid::Ulid;

use crate::identity::Identity;
use crate::model::*;
use crate::store::StoreError;

use super::conflict::first_conflict;
use super::error::write_error;
use super::{ClearedRange, Engine, EngineError};

impl Engine {
    /// Persist a pending booking for a range cleared just before.
    pub async fn create_booking(
        &self,
        identity: &Identity,
        cleared: ClearedRange,
    ) -> Result<BookingId, EngineError> {
        let room_id = cleared.room_id();
        let booking = Booking {
            id: Ulid::new(),
            room_id,
            requester_id: identity.user_id.clone(),
            span: cleared.span(),
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        };
        let id = booking.id;
        let span = booking.span;

        self.write("insert_booking", self.store.insert_booking(booking))
            .await?;
        self.invalidate(&room_id);
        metrics::counter!(crate::observability::BOOKINGS_REQUESTED_TOTAL).increment(1);
        info!("booking {id} requested by {} on room {room_id} for {span}", identity.user_id);
        Ok(id)
    }

    /// Validate and create as one operation.
    pub async fn request_booking(
        &self,
        identity: &Identity,
        room_id: RoomId,
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
    ) -> Result<BookingId, EngineError> {
        let cleared = self.validate_booking(room_id, check_in, check_out).await?;
        self.create_booking(identity, cleared).await
    }

    /// Administrative transition out of `pending`. Returns the affected room,
    /// whose availability the caller re-fetches.
    pub async fn set_status(
        &self,
        identity: &Identity,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<RoomId, EngineError> {
        if !identity.is_admin() {
            return Err(EngineError::Forbidden(identity.user_id.clone()));
        }
        let booking = self
            .read("get_booking", self.store.get_booking(id))
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if status == BookingStatus::Pending || booking.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                id,
                from: booking.status,
                to: status,
            });
        }

        if status == BookingStatus::Approved {
            let approved = self
                .read(
                    "overlapping_bookings",
                    self.store.overlapping_bookings(
                        booking.room_id,
                        BookingStatus::Approved,
                        booking.span,
                    ),
                )
                .await?;
            if let Some(existing) = first_conflict(&booking.span, &approved, Some(id)) {
                return Err(EngineError::Conflict(existing.id));
            }
        }

        let updated = match self
            .timed(
                "update_status",
                self.store.update_status(id, BookingStatus::Pending, status),
            )
            .await
        {
            Some(Ok(updated)) => updated,
            Some(Err(StoreError::StatusMismatch { actual, .. })) => {
                return Err(EngineError::InvalidTransition {
                    id,
                    from: actual,
                    to: status,
                });
            }
            Some(Err(e)) => return Err(write_error(e)),
            None => return Err(EngineError::WriteFailed("update_status timed out".into())),
        };

        self.invalidate(&updated.room_id);
        metrics::counter!(
            crate::observability::STATUS_TRANSITIONS_TOTAL,
            "status" => status.as_str()
        )
        .increment(1);
        info!(
            "booking {id} on room {} {status} by {}",
            updated.room_id, identity.user_id
        );
        Ok(updated.room_id)
    }

    /// Add a room to the catalog the store holds.
    pub async fn create_room(&self, room: Room) -> Result<(), EngineError> {
        let id = room.id;
        self.write("insert_room", self.store.insert_room(room)).await?;
        info!("room {id} created");
        Ok(())
    }
}

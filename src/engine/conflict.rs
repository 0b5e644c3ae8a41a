use chrono::NaiveDate;

use crate::model::*;

use super::{Engine, EngineError};

/// A range that just passed [`Engine::validate_booking`] for one room.
/// Only the validator can make one; [`Engine::create_booking`] consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearedRange {
    room_id: RoomId,
    span: DateSpan,
}

impl ClearedRange {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn span(&self) -> DateSpan {
        self.span
    }
}

/// Storage-independent preconditions: both dates present, check-in first.
pub(crate) fn check_range(
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
) -> Result<DateSpan, EngineError> {
    let check_in = check_in.ok_or(EngineError::InvalidRange("check-in date missing"))?;
    let check_out = check_out.ok_or(EngineError::InvalidRange("check-out date missing"))?;
    DateSpan::checked(check_in, check_out)
        .ok_or(EngineError::InvalidRange("check-in must be before check-out"))
}

pub(crate) fn check_stay_length(span: &DateSpan, max_nights: i64) -> Result<(), EngineError> {
    if span.nights() > max_nights {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// First approved booking overlapping `span`, except `exclude`.
pub(crate) fn first_conflict<'a>(
    span: &DateSpan,
    existing: &'a [Booking],
    exclude: Option<BookingId>,
) -> Option<&'a Booking> {
    existing
        .iter()
        .find(|b| b.is_approved() && Some(b.id) != exclude && b.span.overlaps(span))
}

impl Engine {
    /// Authoritative pre-write check for a booking request.
    ///
    /// Rejects with `InvalidRange` before touching the store, then with
    /// `Conflict` if an approved booking of the room overlaps
    /// `[check_in, check_out)`. Never writes.
    pub async fn validate_booking(
        &self,
        room_id: RoomId,
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
    ) -> Result<ClearedRange, EngineError> {
        let result = self.check_booking(room_id, check_in, check_out).await;
        if let Err(e) = &result {
            metrics::counter!(
                crate::observability::VALIDATION_REJECTIONS_TOTAL,
                "reason" => crate::observability::rejection_label(e)
            )
            .increment(1);
            tracing::debug!("booking request on room {room_id} rejected: {e}");
        }
        result
    }

    async fn check_booking(
        &self,
        room_id: RoomId,
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
    ) -> Result<ClearedRange, EngineError> {
        let span = check_range(check_in, check_out)?;
        check_stay_length(&span, self.config.max_stay_nights)?;

        self.get_room(room_id)
            .await?
            .ok_or(EngineError::NotFound(room_id))?;
        let approved = self
            .read(
                "overlapping_bookings",
                self.store
                    .overlapping_bookings(room_id, BookingStatus::Approved, span),
            )
            .await?;
        if let Some(existing) = first_conflict(&span, &approved, None) {
            return Err(EngineError::Conflict(existing.id));
        }
        Ok(ClearedRange { room_id, span })
    }
}

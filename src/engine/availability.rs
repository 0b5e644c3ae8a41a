use crate::model::*;

use super::{Engine, EngineError};

/// Union of the inclusive day expansion of every approved booking.
/// Pending and rejected bookings never disable a date.
pub fn disabled_dates<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> DisabledDates {
    bookings
        .into_iter()
        .filter(|b| b.is_approved())
        .flat_map(|b| b.span.days())
        .collect()
}

impl Engine {
    /// Dates the picker must refuse for `room_id`.
    ///
    /// A failed or timed-out fetch is `DataUnavailable`; an empty set is only
    /// ever returned when the store answered.
    pub async fn compute_disabled_dates(&self, room_id: RoomId) -> Result<DisabledDates, EngineError> {
        let generation = self.cache.as_ref().map(|c| c.generation(&room_id));
        if let Some(cache) = &self.cache
            && let Some(dates) = cache.get(&room_id)
        {
            metrics::counter!(crate::observability::AVAILABILITY_CACHE_HITS_TOTAL).increment(1);
            return Ok(dates);
        }

        self.get_room(room_id)
            .await?
            .ok_or(EngineError::NotFound(room_id))?;
        let approved = self
            .read(
                "bookings_for_room",
                self.store.bookings_for_room(room_id, Some(BookingStatus::Approved)),
            )
            .await?;
        let dates = disabled_dates(&approved);

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            metrics::counter!(crate::observability::AVAILABILITY_CACHE_MISSES_TOTAL).increment(1);
            cache.put(room_id, generation, dates.clone());
        }
        tracing::debug!("room {room_id}: {} disabled dates", dates.len());
        Ok(dates)
    }
}

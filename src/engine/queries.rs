use crate::identity::Identity;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn get_room(&self, id: RoomId) -> Result<Option<Room>, EngineError> {
        self.read("get_room", self.store.get_room(id)).await
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, EngineError> {
        self.read("list_rooms", self.store.list_rooms()).await
    }

    pub async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, EngineError> {
        self.read("get_booking", self.store.get_booking(id)).await
    }

    /// Every booking for an admin, the requester's own otherwise. Newest first.
    pub async fn list_bookings(&self, identity: &Identity) -> Result<Vec<Booking>, EngineError> {
        let requester = (!identity.is_admin()).then_some(identity.user_id.as_str());
        self.read("list_bookings", self.store.list_bookings(requester))
            .await
    }

    pub async fn bookings_for_room(
        &self,
        room_id: RoomId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, EngineError> {
        self.read(
            "bookings_for_room",
            self.store.bookings_for_room(room_id, status),
        )
        .await
    }

    /// Counts over the bookings `identity` can see.
    pub async fn booking_counts(&self, identity: &Identity) -> Result<BookingCounts, EngineError> {
        let bookings = self.list_bookings(identity).await?;
        Ok(BookingCounts::from_bookings(&bookings))
    }
}

//! Per-user application state driving the booking flow.
//!
//! A [`Session`] owns what a client would otherwise keep in globals: the
//! acting identity, the room list and the visible booking list. Booking goes
//! through two checks: [`Session::open_picker`] computes disabled dates as a
//! hint, and [`Session::submit_booking`] re-validates against the store right
//! before inserting. Only the second one guards the write.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::engine::{Engine, EngineError};
use crate::identity::{Identity, IdentityProvider};
use crate::model::*;

/// Outcome of an approve/reject: the room it touched and its re-fetched
/// availability. The transition itself succeeded even if the re-fetch failed.
#[derive(Debug)]
pub struct Transition {
    pub room_id: RoomId,
    pub availability: Result<DisabledDates, EngineError>,
}

pub struct Session {
    engine: Arc<Engine>,
    identity: Identity,
    rooms: Vec<Room>,
    bookings: Vec<Booking>,
    stale: bool,
}

impl Session {
    /// Resolve the identity, then load rooms and visible bookings.
    pub async fn start(
        engine: Arc<Engine>,
        provider: &dyn IdentityProvider,
    ) -> Result<Self, EngineError> {
        let identity = provider.current_identity().await?;
        let mut session = Self {
            engine,
            identity,
            rooms: Vec::new(),
            bookings: Vec::new(),
            stale: true,
        };
        session.refresh().await?;
        Ok(session)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// True when the last re-fetch after a write failed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn counts(&self) -> BookingCounts {
        BookingCounts::from_bookings(&self.bookings)
    }

    pub async fn refresh(&mut self) -> Result<(), EngineError> {
        self.rooms = self.engine.list_rooms().await?;
        self.refresh_bookings().await
    }

    pub async fn refresh_bookings(&mut self) -> Result<(), EngineError> {
        self.bookings = self.engine.list_bookings(&self.identity).await?;
        self.stale = false;
        Ok(())
    }

    /// Advisory: dates to grey out when the picker opens.
    pub async fn open_picker(&self, room_id: RoomId) -> Result<DisabledDates, EngineError> {
        self.engine.compute_disabled_dates(room_id).await
    }

    /// Authoritative: re-check against the store, then insert as pending.
    pub async fn submit_booking(
        &mut self,
        room_id: RoomId,
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
    ) -> Result<BookingId, EngineError> {
        let id = self
            .engine
            .request_booking(&self.identity, room_id, check_in, check_out)
            .await?;
        self.after_write().await;
        Ok(id)
    }

    pub async fn approve(&mut self, id: BookingId) -> Result<Transition, EngineError> {
        self.transition(id, BookingStatus::Approved).await
    }

    pub async fn reject(&mut self, id: BookingId) -> Result<Transition, EngineError> {
        self.transition(id, BookingStatus::Rejected).await
    }

    async fn transition(
        &mut self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<Transition, EngineError> {
        let room_id = self.engine.set_status(&self.identity, id, status).await?;
        let availability = self.engine.compute_disabled_dates(room_id).await;
        self.after_write().await;
        Ok(Transition {
            room_id,
            availability,
        })
    }

    async fn after_write(&mut self) {
        if let Err(e) = self.refresh_bookings().await {
            warn!("booking list refresh for {} failed: {e}", self.identity.user_id);
            self.stale = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::identity::StaticIdentity;
    use crate::store::InMemoryStore;
    use ulid::Ulid;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    async fn engine_with_room() -> (Arc<Engine>, RoomId) {
        let engine = Arc::new(Engine::new(
            Arc::new(InMemoryStore::new()),
            EngineConfig::default(),
        ));
        let room_id = Ulid::new();
        engine
            .create_room(Room {
                id: room_id,
                name: "Harbour view".into(),
                description: String::new(),
                price_per_night: 15_000,
                capacity: 2,
                image_url: None,
            })
            .await
            .unwrap();
        (engine, room_id)
    }

    #[tokio::test]
    async fn start_loads_rooms() {
        let (engine, room_id) = engine_with_room().await;
        let session = Session::start(engine, &StaticIdentity::new(Identity::user("ana")))
            .await
            .unwrap();
        assert_eq!(session.rooms().len(), 1);
        assert_eq!(session.rooms()[0].id, room_id);
        assert!(session.bookings().is_empty());
        assert!(!session.is_stale());
    }

    #[tokio::test]
    async fn user_sees_only_own_bookings() {
        let (engine, room_id) = engine_with_room().await;
        let mut ana = Session::start(engine.clone(), &StaticIdentity::new(Identity::user("ana")))
            .await
            .unwrap();
        let mut ben = Session::start(engine.clone(), &StaticIdentity::new(Identity::user("ben")))
            .await
            .unwrap();

        ana.submit_booking(room_id, Some(d(6, 1)), Some(d(6, 3)))
            .await
            .unwrap();
        ben.submit_booking(room_id, Some(d(6, 2)), Some(d(6, 4)))
            .await
            .unwrap();

        assert_eq!(ana.bookings().len(), 1);
        assert_eq!(ana.bookings()[0].requester_id, "ana");
        assert_eq!(ben.counts().pending, 1);

        let admin = Session::start(engine, &StaticIdentity::new(Identity::admin("ops")))
            .await
            .unwrap();
        assert_eq!(admin.counts().total, 2);
    }

    #[tokio::test]
    async fn approve_returns_fresh_availability() {
        let (engine, room_id) = engine_with_room().await;
        let mut guest = Session::start(engine.clone(), &StaticIdentity::new(Identity::user("ana")))
            .await
            .unwrap();
        let id = guest
            .submit_booking(room_id, Some(d(6, 10)), Some(d(6, 12)))
            .await
            .unwrap();
        assert!(guest.open_picker(room_id).await.unwrap().is_empty());

        let mut admin = Session::start(engine, &StaticIdentity::new(Identity::admin("ops")))
            .await
            .unwrap();
        let transition = admin.approve(id).await.unwrap();
        assert_eq!(transition.room_id, room_id);
        let dates = transition.availability.unwrap();
        assert_eq!(dates.len(), 3);
        assert_eq!(admin.counts().approved, 1);

        // the picker of another session sees it on its next open
        assert_eq!(guest.open_picker(room_id).await.unwrap(), dates);
    }

    #[tokio::test]
    async fn guest_cannot_approve() {
        let (engine, room_id) = engine_with_room().await;
        let mut guest = Session::start(engine, &StaticIdentity::new(Identity::user("ana")))
            .await
            .unwrap();
        let id = guest
            .submit_booking(room_id, Some(d(6, 10)), Some(d(6, 12)))
            .await
            .unwrap();
        assert!(matches!(
            guest.approve(id).await,
            Err(EngineError::Forbidden(_))
        ));
        assert_eq!(guest.counts().pending, 1);
    }

    #[tokio::test]
    async fn missing_date_rejected_before_store() {
        let (engine, room_id) = engine_with_room().await;
        let mut guest = Session::start(engine, &StaticIdentity::new(Identity::user("ana")))
            .await
            .unwrap();
        assert!(matches!(
            guest.submit_booking(room_id, Some(d(6, 10)), None).await,
            Err(EngineError::InvalidRange(_))
        ));
        assert!(guest.bookings().is_empty());
    }
}

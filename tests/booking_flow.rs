use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use tokio_test::{assert_err, assert_ok};
use ulid::Ulid;

use roombook::config::EngineConfig;
use roombook::engine::{Engine, EngineError};
use roombook::identity::{Identity, StaticIdentity};
use roombook::model::{BookingStatus, DisabledDates, Room, RoomId};
use roombook::session::Session;
use roombook::store::{BookingStore, InMemoryStore, WalStore};

// ── Test infrastructure ──────────────────────────────────────

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn temp_wal() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("roombook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("bookings.wal")
}

fn room(name: &str) -> Room {
    Room {
        id: Ulid::new(),
        name: name.into(),
        description: format!("{name} with a view"),
        price_per_night: 9_500,
        capacity: 3,
        image_url: Some(format!("https://img.example/{name}.jpg")),
    }
}

async fn seeded(store: Arc<dyn BookingStore>) -> (Arc<Engine>, RoomId) {
    let engine = Arc::new(Engine::new(store, EngineConfig::default()));
    let r = room("garden");
    let id = r.id;
    assert_ok!(engine.create_room(r).await);
    (engine, id)
}

async fn session(engine: &Arc<Engine>, identity: Identity) -> Session {
    Session::start(engine.clone(), &StaticIdentity::new(identity))
        .await
        .unwrap()
}

// ── Full flow ────────────────────────────────────────────────

#[tokio::test]
async fn guest_books_admin_approves_next_guest_blocked() {
    let (engine, room_id) = seeded(Arc::new(InMemoryStore::new())).await;
    let mut ana = session(&engine, Identity::user("ana")).await;
    let mut ops = session(&engine, Identity::admin("ops")).await;
    let mut ben = session(&engine, Identity::user("ben")).await;

    assert!(assert_ok!(ana.open_picker(room_id).await).is_empty());
    let booking = assert_ok!(ana.submit_booking(room_id, Some(d(6, 10)), Some(d(6, 15))).await);

    // pending does not block
    assert_ok!(ben.submit_booking(room_id, Some(d(6, 12)), Some(d(6, 13))).await);
    assert_ok!(ops.refresh().await);
    assert_eq!(ops.counts().pending, 2);

    let transition = assert_ok!(ops.approve(booking).await);
    let disabled: DisabledDates = assert_ok!(transition.availability);
    assert_eq!(disabled.len(), 6);
    assert!(disabled.contains(&d(6, 15)));

    let err = assert_err!(ben.submit_booking(room_id, Some(d(6, 14)), Some(d(6, 18))).await);
    assert!(matches!(err, EngineError::Conflict(id) if id == booking));
    assert_ok!(ben.submit_booking(room_id, Some(d(6, 15)), Some(d(6, 18))).await);

    assert_ok!(ana.refresh_bookings().await);
    assert_eq!(ana.bookings()[0].status, BookingStatus::Approved);
    assert_eq!(ben.bookings().len(), 2);
}

#[tokio::test]
async fn wal_store_survives_restart() {
    let path = temp_wal();
    let room_id;
    let approved;
    {
        let store = Arc::new(WalStore::open(&path).unwrap());
        let (engine, id) = seeded(store).await;
        room_id = id;
        let guest = Identity::user("ana");
        approved = assert_ok!(
            engine
                .request_booking(&guest, room_id, Some(d(8, 1)), Some(d(8, 4)))
                .await
        );
        let rejected = assert_ok!(
            engine
                .request_booking(&guest, room_id, Some(d(8, 2)), Some(d(8, 3)))
                .await
        );
        let admin = Identity::admin("ops");
        assert_ok!(engine.set_status(&admin, approved, BookingStatus::Approved).await);
        assert_ok!(engine.set_status(&admin, rejected, BookingStatus::Rejected).await);
    }

    let store = Arc::new(WalStore::open(&path).unwrap());
    let engine = Engine::new(store, EngineConfig::default());
    let restored = assert_ok!(engine.get_room(room_id).await).unwrap();
    assert_eq!(restored.name, "garden");
    assert_eq!(restored.image_url.as_deref(), Some("https://img.example/garden.jpg"));

    let dates = assert_ok!(engine.compute_disabled_dates(room_id).await);
    let expected: DisabledDates = [d(8, 1), d(8, 2), d(8, 3), d(8, 4)].into_iter().collect();
    assert_eq!(dates, expected);

    let counts = assert_ok!(engine.booking_counts(&Identity::admin("ops")).await);
    assert_eq!((counts.approved, counts.rejected, counts.pending), (1, 1, 0));

    // approved bookings still block after replay
    let err = assert_err!(
        engine
            .validate_booking(room_id, Some(d(8, 3)), Some(d(8, 5)))
            .await
    );
    assert!(matches!(err, EngineError::Conflict(id) if id == approved));
}

#[tokio::test]
async fn compaction_keeps_state() {
    let path = temp_wal();
    let store = Arc::new(WalStore::open(&path).unwrap());
    let (engine, room_id) = seeded(store.clone()).await;
    let admin = Identity::admin("ops");
    for day in 1..=8 {
        let id = assert_ok!(
            engine
                .request_booking(&Identity::user("ana"), room_id, Some(d(9, day * 3)), Some(d(9, day * 3 + 1)))
                .await
        );
        assert_ok!(engine.set_status(&admin, id, BookingStatus::Approved).await);
    }
    assert!(assert_ok!(store.compact_if_needed(4).await));
    assert!(!assert_ok!(store.compact_if_needed(4).await));
    drop(engine);
    drop(store);

    let store = Arc::new(WalStore::open(&path).unwrap());
    let engine = Engine::new(store, EngineConfig::default());
    assert_eq!(assert_ok!(engine.compute_disabled_dates(room_id).await).len(), 16);
}

// ── Concurrency ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_of_overlapping_requests() {
    let store = Arc::new(WalStore::open(&temp_wal()).unwrap());
    let (engine, room_id) = seeded(store).await;

    let mut ids = Vec::new();
    for i in 0..16 {
        let guest = Identity::user(format!("guest-{i}"));
        ids.push(assert_ok!(
            engine
                .request_booking(&guest, room_id, Some(d(10, 10)), Some(d(10, 12)))
                .await
        ));
    }

    let admin = Identity::admin("ops");
    let results = join_all(ids.iter().map(|&id| {
        let engine = engine.clone();
        let admin = admin.clone();
        tokio::spawn(async move { engine.set_status(&admin, id, BookingStatus::Approved).await })
    }))
    .await;

    let mut winners = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => winners += 1,
            Err(EngineError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
    let approved = assert_ok!(
        engine
            .bookings_for_room(room_id, Some(BookingStatus::Approved))
            .await
    );
    assert_eq!(approved.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_all_land_pending() {
    let (engine, room_id) = seeded(Arc::new(InMemoryStore::new())).await;
    let results = join_all((0..50u32).map(|i| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let guest = Identity::user(format!("guest-{i}"));
            let start = d(11, 1 + i % 20);
            engine
                .request_booking(&guest, room_id, Some(start), Some(start + chrono::Duration::days(2)))
                .await
        })
    }))
    .await;
    for result in results {
        assert_ok!(result.unwrap());
    }
    let counts = assert_ok!(engine.booking_counts(&Identity::admin("ops")).await);
    assert_eq!(counts.pending, 50);
    assert_eq!(counts.total, 50);
}

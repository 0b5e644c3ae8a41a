use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use ulid::Ulid;

use roombook::config::EngineConfig;
use roombook::dates::expand_range;
use roombook::engine::{Engine, EngineError, disabled_dates};
use roombook::identity::Identity;
use roombook::model::{BookingStatus, Room};
use roombook::store::InMemoryStore;

#[derive(Debug, Clone)]
enum Step {
    Request { offset: i64, nights: i64 },
    Approve(usize),
    Reject(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0i64..60, 1i64..10).prop_map(|(offset, nights)| Step::Request { offset, nights }),
        2 => (0usize..32).prop_map(Step::Approve),
        1 => (0usize..32).prop_map(Step::Reject),
    ]
}

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn approved_bookings_never_overlap(steps in prop::collection::vec(step(), 1..40)) {
        let rt = runtime();
        rt.block_on(async {
            let engine = Engine::new(Arc::new(InMemoryStore::new()), EngineConfig::default());
            let room_id = Ulid::new();
            engine.create_room(Room {
                id: room_id,
                name: "prop".into(),
                description: String::new(),
                price_per_night: 1,
                capacity: 1,
                image_url: None,
            }).await.unwrap();

            let admin = Identity::admin("ops");
            let guest = Identity::user("guest");
            let mut requested = Vec::new();
            for step in steps {
                match step {
                    Step::Request { offset, nights } => {
                        let start = base() + Duration::days(offset);
                        match engine
                            .request_booking(&guest, room_id, Some(start), Some(start + Duration::days(nights)))
                            .await
                        {
                            Ok(id) => requested.push(id),
                            Err(EngineError::Conflict(_)) => {}
                            Err(e) => panic!("unexpected request error: {e}"),
                        }
                    }
                    Step::Approve(_) | Step::Reject(_) if requested.is_empty() => {}
                    Step::Approve(i) => {
                        let id = requested[i % requested.len()];
                        let _ = engine.set_status(&admin, id, BookingStatus::Approved).await;
                    }
                    Step::Reject(i) => {
                        let id = requested[i % requested.len()];
                        let _ = engine.set_status(&admin, id, BookingStatus::Rejected).await;
                    }
                }
            }

            let approved = engine
                .bookings_for_room(room_id, Some(BookingStatus::Approved))
                .await
                .unwrap();
            for (i, a) in approved.iter().enumerate() {
                for b in &approved[i + 1..] {
                    assert!(!a.span.overlaps(&b.span), "{} overlaps {}", a.span, b.span);
                }
            }

            // disabled dates are exactly the inclusive days of approved bookings
            let dates = engine.compute_disabled_dates(room_id).await.unwrap();
            assert_eq!(dates, disabled_dates(&approved));
        });
    }

    #[test]
    fn expand_range_is_inclusive(offset in 0i64..400, len in 0i64..60) {
        let start = base() + Duration::days(offset);
        let days = expand_range(start, start + Duration::days(len));
        prop_assert_eq!(days.len() as i64, len + 1);
        prop_assert_eq!(days.first().copied(), Some(start));
        prop_assert_eq!(days.last().copied(), Some(start + Duration::days(len)));
    }
}

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::model::{DisabledDates, RoomId};

struct Cached {
    computed_at: Instant,
    generation: u64,
    dates: DisabledDates,
}

/// Short-lived per-room disabled-date cache.
///
/// Each room has a generation bumped by every invalidation. A result is only
/// stored and served while the generation it was fetched under is current, so
/// a fetch that raced a write never repopulates the cache.
pub(super) struct AvailabilityCache {
    ttl: Duration,
    entries: DashMap<RoomId, Cached>,
    generations: DashMap<RoomId, u64>,
}

impl AvailabilityCache {
    pub(super) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    pub(super) fn generation(&self, room_id: &RoomId) -> u64 {
        self.generations.get(room_id).map_or(0, |g| *g)
    }

    pub(super) fn get(&self, room_id: &RoomId) -> Option<DisabledDates> {
        let current = self.generation(room_id);
        let entry = self.entries.get(room_id)?;
        if entry.generation == current && entry.computed_at.elapsed() < self.ttl {
            return Some(entry.dates.clone());
        }
        drop(entry);
        self.entries.remove(room_id);
        None
    }

    pub(super) fn put(&self, room_id: RoomId, generation: u64, dates: DisabledDates) {
        if generation != self.generation(&room_id) {
            return;
        }
        self.entries.insert(
            room_id,
            Cached {
                computed_at: Instant::now(),
                generation,
                dates,
            },
        );
    }

    pub(super) fn invalidate(&self, room_id: &RoomId) {
        *self.generations.entry(*room_id).or_insert(0) += 1;
        self.entries.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn dates() -> DisabledDates {
        [NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()].into_iter().collect()
    }

    #[test]
    fn put_then_get() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        let room = Ulid::new();
        assert!(cache.get(&room).is_none());
        cache.put(room, cache.generation(&room), dates());
        assert_eq!(cache.get(&room), Some(dates()));
    }

    #[test]
    fn invalidate_drops_entry() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        let room = Ulid::new();
        cache.put(room, 0, dates());
        cache.invalidate(&room);
        assert!(cache.get(&room).is_none());
        assert_eq!(cache.generation(&room), 1);
    }

    #[test]
    fn stale_generation_never_stored() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        let room = Ulid::new();
        let fetched_under = cache.generation(&room);
        cache.invalidate(&room); // write lands while the fetch is in flight
        cache.put(room, fetched_under, dates());
        assert!(cache.get(&room).is_none());
    }

    #[test]
    fn expired_entry_not_served() {
        let cache = AvailabilityCache::new(Duration::ZERO);
        let room = Ulid::new();
        cache.put(room, 0, dates());
        assert!(cache.get(&room).is_none());
    }

    #[test]
    fn rooms_are_independent() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        let a = Ulid::new();
        let b = Ulid::new();
        cache.put(a, 0, dates());
        cache.put(b, 0, dates());
        cache.invalidate(&a);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());
    }
}

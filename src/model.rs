use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::dates::{expand_range, ranges_overlap};

pub type RoomId = Ulid;
pub type BookingId = Ulid;

/// Dates a picker must refuse, derived from approved bookings only.
pub type DisabledDates = BTreeSet<NaiveDate>;

/// A stay. Half-open `[check_in, check_out)` for overlap purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateSpan {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check-in must be before check-out");
        Self { check_in, check_out }
    }

    /// `None` unless `check_in < check_out`.
    pub fn checked(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        ranges_overlap(self.check_in, self.check_out, other.check_in, other.check_out)
    }

    /// Inclusive expansion, check-out day included.
    pub fn days(&self) -> Vec<NaiveDate> {
        expand_range(self.check_in, self.check_out)
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected bookings never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    /// Nightly price in the smallest currency unit.
    pub price_per_night: u64,
    /// Guests the room sleeps.
    pub capacity: u32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub requester_id: String,
    pub span: DateSpan,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_approved(&self) -> bool {
        self.status == BookingStatus::Approved
    }
}

/// A room and its bookings, sorted by check-in.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by check-in.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.span.check_in <= booking.span.check_in);
        self.bookings.insert(pos, booking);
    }

    pub fn get_booking(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    /// Returns `false` if no booking has that id.
    pub fn set_status(&mut self, id: &BookingId, status: BookingStatus) -> bool {
        match self.bookings.iter_mut().find(|b| b.id == *id) {
            Some(b) => {
                b.status = status;
                true
            }
            None => false,
        }
    }

    /// Bookings whose span overlaps `query` (half-open).
    /// Binary search skips bookings checking in at or after `query.check_out`.
    pub fn overlapping(&self, query: &DateSpan) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.check_in < query.check_out);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.check_out > query.check_in)
    }

    pub fn with_status(&self, status: BookingStatus) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(move |b| b.status == status)
    }
}

/// WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    BookingRequested {
        booking: Booking,
    },
    BookingStatusChanged {
        id: BookingId,
        room_id: RoomId,
        status: BookingStatus,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Totals per status over some booking collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCounts {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl BookingCounts {
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        bookings
            .into_iter()
            .fold(Self::default(), |mut counts, booking| {
                counts.total += 1;
                match booking.status {
                    BookingStatus::Pending => counts.pending += 1,
                    BookingStatus::Approved => counts.approved += 1,
                    BookingStatus::Rejected => counts.rejected += 1,
                }
                counts
            })
    }
}

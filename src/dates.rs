use chrono::{Duration, NaiveDate};

/// Every calendar day from `start` to `end`, both ends included.
///
/// This is the picker expansion: a booking's check-out day comes back as well,
/// so the next guest cannot pick the departure day as a start date. Overlap
/// math must go through [`ranges_overlap`] instead.
pub fn expand_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    (0..=(end - start).num_days())
        .map(|i| start + Duration::days(i))
        .collect()
}

/// Half-open overlap test on `[a_start, a_end)` and `[b_start, b_end)`.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

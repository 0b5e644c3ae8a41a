pub const MAX_ROOMS: usize = 10_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 50_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_REQUESTER_ID_LEN: usize = 128;

/// Longest stay accepted by the validator unless configured otherwise.
pub const DEFAULT_MAX_STAY_NIGHTS: i64 = 366;

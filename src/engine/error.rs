use ulid::Ulid;

use crate::model::{BookingId, BookingStatus};
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// A date is missing or check-in is not before check-out.
    InvalidRange(&'static str),
    /// The range overlaps this approved booking.
    Conflict(BookingId),
    /// A read failed; availability is unknown, not free.
    DataUnavailable(String),
    /// An insert or status update failed; nothing changed.
    WriteFailed(String),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The acting user lacks the admin role.
    Forbidden(String),
    InvalidTransition {
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange(reason) => write!(f, "invalid range: {reason}"),
            EngineError::Conflict(id) => write!(f, "conflict with approved booking: {id}"),
            EngineError::DataUnavailable(e) => write!(f, "data unavailable: {e}"),
            EngineError::WriteFailed(e) => write!(f, "write failed: {e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Forbidden(user) => {
                write!(f, "user {user:?} may not change booking status")
            }
            EngineError::InvalidTransition { id, from, to } => {
                write!(f, "booking {id} cannot move from {from} to {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Map a failed store read. Anything but a missing row means "unknown".
pub(super) fn read_error(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound(id) => EngineError::NotFound(id),
        other => EngineError::DataUnavailable(other.to_string()),
    }
}

/// Map a failed store write.
pub(super) fn write_error(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound(id) => EngineError::NotFound(id),
        StoreError::AlreadyExists(id) => EngineError::AlreadyExists(id),
        StoreError::Exclusion(id) => EngineError::Conflict(id),
        StoreError::InvalidSpan(_) => EngineError::InvalidRange("check-in must be before check-out"),
        StoreError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
        other => EngineError::WriteFailed(other.to_string()),
    }
}

pub mod config;
pub mod dates;
pub mod engine;
pub mod identity;
pub mod limits;
pub mod model;
pub mod observability;
pub mod session;
pub mod store;
pub mod wal;

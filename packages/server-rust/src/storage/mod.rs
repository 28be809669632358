//! Table store backends for the server.
//!
//! - [`MemoryStore`]: `DashMap`-backed tables, optionally seeded from JSON
//! - [`PostgresStore`]: `sqlx` pool against a live database (feature `postgres`)
//! - [`MeteredStore`]: wraps either one with request metrics

pub mod memory;
pub mod metered;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
pub use metered::{MeteredStore, STORE_REQUESTS_TOTAL, STORE_REQUEST_DURATION};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

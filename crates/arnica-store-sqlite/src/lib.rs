//! SQLite backend for the Arnica activation store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Also provides
//! [`SqliteDirectory`], a SQLite-backed implementation of the
//! identity-provider boundary for deployments without an external provider.

mod directory;
mod encode;
mod schema;
mod store;

pub mod error;

pub use directory::SqliteDirectory;
pub use error::{Error, Result};
pub use store::SqliteStore;

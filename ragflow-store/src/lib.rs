//! SQLite-backed implementations of `ragflow-core`'s persistence contracts.
//!
//! A separate crate, the way the teacher keeps its own workspace storage out
//! of the orchestration crate: one `rusqlite::Connection`, shared via
//! `Arc<Mutex<_>>`, driving both `SessionStore` and `MessageStore`.

mod store;

pub use store::{SqliteStore, StoreError};

//! Session event store: append-only per-session logs with a compaction-
//! aware read view.

pub mod event;
mod filter;
mod store;

pub use event::{CompactionRecord, Event, EventAuthor};
pub use store::{InMemorySessionStore, Session, SessionError, SessionStore};

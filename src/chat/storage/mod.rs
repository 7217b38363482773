//! Persistence collaborator: session records and message sequences.

pub mod persister;
pub mod session_store;

pub use persister::StorePersister;
pub use session_store::{SessionStore, SqliteSessionStore, StoreError, StoreFuture, StoreResult};

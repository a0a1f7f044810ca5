//! Infrastructure: event store, command dispatch, read models, projections.
//!
//! No IO frameworks here; everything is behind traits with in-memory
//! implementations, so the HTTP layer composes and tests against the same
//! code paths.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use read_model::{InMemoryStore, Store};

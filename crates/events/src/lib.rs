//! `libram-events` — domain event contracts and stream metadata.
//!
//! Domain crates implement [`Event`] for their event enums; infrastructure
//! wraps serialized events in [`EventEnvelope`]s when moving them between the
//! store and read-model projections.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;

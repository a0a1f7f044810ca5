//! Command execution pipeline.
//!
//! Every mutation runs the same way: load the aggregate's event stream,
//! rehydrate state, let the aggregate decide, then append the decided events
//! with an exact expected version. The final append is a compare-and-swap on
//! the stream version, so concurrent read-modify-write requests cannot lose
//! updates; the loser gets `DispatchError::Concurrency`.
//!
//! Projections are applied synchronously by the caller from the returned
//! committed events. There is no queue or background worker: the commit is
//! durable (store-level) before the HTTP response is produced.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use libram_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    Concurrency(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Domain invariant failure (deterministic).
    InvariantViolation(String),
    /// Domain authorization failure.
    Unauthorized,
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store so tests and production wire the same pipeline.
/// Aggregates must be deterministic and side-effect free; `apply()` tracks
/// the version used for the concurrency check.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// 1. **Load**: all events for the aggregate.
    /// 2. **Validate**: stream ordering (defense against a buggy backend).
    /// 3. **Rehydrate**: apply history to a fresh aggregate from `make_aggregate`.
    /// 4. **Decide**: `aggregate.handle(command)`, pure.
    /// 5. **Persist**: append with `ExpectedVersion::Exact(loaded version)`.
    ///
    /// Returns the committed events with assigned sequence numbers; an empty
    /// result means the command was a recorded no-op. On `Concurrency`
    /// errors callers may reload and retry, or surface a conflict.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: libram_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // The stream must belong to this aggregate and increase monotonically.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!("loaded stream contains wrong aggregate_id at index {idx}"),
            )));
        }
        if e.sequence_number == 0 || e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use chrono::Utc;
    use libram_catalog::{AddBook, Book, BookCommand, BookDetails, BookId, ItemType, RestockBook};

    fn details() -> BookDetails {
        BookDetails {
            title: "Seveneves".to_string(),
            author: "Neal Stephenson".to_string(),
            price_cents: 2100,
            category: "Fiction".to_string(),
            item_type: ItemType::Sale,
            location: "B-3".to_string(),
            image_url: None,
        }
    }

    fn add_cmd(book_id: BookId) -> BookCommand {
        BookCommand::AddBook(AddBook {
            book_id,
            details: details(),
            initial_stock: 2,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_decided_events() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let book_id = BookId(AggregateId::new());

        let committed = dispatcher
            .dispatch(book_id.0, "catalog.book", add_cmd(book_id), |id| {
                Book::empty(BookId(id))
            })
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].event_type, "catalog.book.added");
        assert_eq!(committed[0].sequence_number, 1);
    }

    #[test]
    fn dispatch_rehydrates_before_deciding() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let book_id = BookId(AggregateId::new());

        dispatcher
            .dispatch(book_id.0, "catalog.book", add_cmd(book_id), |id| {
                Book::empty(BookId(id))
            })
            .unwrap();

        // Adding the same book again must see the rehydrated state and fail.
        let err = dispatcher
            .dispatch(book_id.0, "catalog.book", add_cmd(book_id), |id| {
                Book::empty(BookId(id))
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }

    #[test]
    fn dispatch_continues_the_stream_version() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let book_id = BookId(AggregateId::new());

        dispatcher
            .dispatch(book_id.0, "catalog.book", add_cmd(book_id), |id| {
                Book::empty(BookId(id))
            })
            .unwrap();

        let committed = dispatcher
            .dispatch(
                book_id.0,
                "catalog.book",
                BookCommand::RestockBook(RestockBook {
                    book_id,
                    quantity: 3,
                    occurred_at: Utc::now(),
                }),
                |id| Book::empty(BookId(id)),
            )
            .unwrap();
        assert_eq!(committed[0].sequence_number, 2);
    }

    #[test]
    fn domain_errors_are_mapped() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let book_id = BookId(AggregateId::new());

        // Restocking a book that was never added.
        let err = dispatcher
            .dispatch(
                book_id.0,
                "catalog.book",
                BookCommand::RestockBook(RestockBook {
                    book_id,
                    quantity: 3,
                    occurred_at: Utc::now(),
                }),
                |id| Book::empty(BookId(id)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }
}

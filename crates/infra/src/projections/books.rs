use serde_json::Value as JsonValue;

use libram_catalog::{BookDetails, BookEvent, BookId, ItemType, LOW_STOCK_THRESHOLD};
use libram_events::EventEnvelope;

use super::cursors::{Advance, Cursors, ProjectionError};
use crate::read_model::Store;

/// Catalog listing row, one per book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookReadModel {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub price_cents: u64,
    pub category: String,
    pub item_type: ItemType,
    pub location: String,
    pub image_url: Option<String>,
    pub stock_total: i64,
    pub stock_available: i64,
    pub stock_borrowed: i64,
    pub stock_sold: i64,
}

impl BookReadModel {
    pub fn is_low_stock(&self) -> bool {
        self.stock_available < LOW_STOCK_THRESHOLD
    }

    fn from_details(book_id: BookId, details: &BookDetails, initial_stock: i64) -> Self {
        Self {
            book_id,
            title: details.title.clone(),
            author: details.author.clone(),
            price_cents: details.price_cents,
            category: details.category.clone(),
            item_type: details.item_type,
            location: details.location.clone(),
            image_url: details.image_url.clone(),
            stock_total: initial_stock,
            stock_available: initial_stock,
            stock_borrowed: 0,
            stock_sold: 0,
        }
    }
}

#[derive(Debug)]
pub struct BooksProjection<S>
where
    S: Store<BookId, BookReadModel>,
{
    store: S,
    cursors: Cursors,
}

impl<S> BooksProjection<S>
where
    S: Store<BookId, BookReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, book_id: &BookId) -> Option<BookReadModel> {
        self.store.get(book_id)
    }

    pub fn list(&self) -> Vec<BookReadModel> {
        let mut books = self.store.list();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        books
    }

    /// Books below the restocking threshold.
    pub fn low_stock(&self) -> Vec<BookReadModel> {
        self.list().into_iter().filter(|b| b.is_low_stock()).collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "catalog.book" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        match self.cursors.check(aggregate_id, seq)? {
            Advance::Seen => return Ok(()),
            Advance::Fresh => {}
        }

        let ev: BookEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let book_id = match &ev {
            BookEvent::BookAdded(e) => e.book_id,
            BookEvent::BookDetailsUpdated(e) => e.book_id,
            BookEvent::BookRestocked(e) => e.book_id,
            BookEvent::SupplyReceived(e) => e.book_id,
            BookEvent::CoverAssigned(e) => e.book_id,
        };
        if book_id.0 != aggregate_id {
            return Err(ProjectionError::AggregateMismatch);
        }

        match ev {
            BookEvent::BookAdded(e) => {
                self.store.upsert(
                    e.book_id,
                    BookReadModel::from_details(e.book_id, &e.details, e.initial_stock),
                );
            }
            BookEvent::BookDetailsUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.book_id) {
                    rm.title = e.details.title;
                    rm.author = e.details.author;
                    rm.price_cents = e.details.price_cents;
                    rm.category = e.details.category;
                    rm.item_type = e.details.item_type;
                    rm.location = e.details.location;
                    rm.image_url = e.details.image_url;
                    self.store.upsert(e.book_id, rm);
                }
            }
            BookEvent::BookRestocked(e) => {
                if let Some(mut rm) = self.store.get(&e.book_id) {
                    rm.stock_total += e.quantity;
                    rm.stock_available += e.quantity;
                    self.store.upsert(e.book_id, rm);
                }
            }
            BookEvent::SupplyReceived(e) => {
                if let Some(mut rm) = self.store.get(&e.book_id) {
                    rm.stock_total += e.quantity;
                    rm.stock_available += e.quantity;
                    self.store.upsert(e.book_id, rm);
                }
            }
            BookEvent::CoverAssigned(e) => {
                if let Some(mut rm) = self.store.get(&e.book_id) {
                    rm.image_url = Some(e.url);
                    self.store.upsert(e.book_id, rm);
                }
            }
        }

        self.cursors.commit(aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryStore;
    use chrono::Utc;
    use libram_catalog::{BookAdded, SupplyReceived};
    use libram_core::AggregateId;
    use uuid::Uuid;

    fn details() -> BookDetails {
        BookDetails {
            title: "Piranesi".to_string(),
            author: "Susanna Clarke".to_string(),
            price_cents: 1600,
            category: "Fiction".to_string(),
            item_type: ItemType::Circulation,
            location: "C-1".to_string(),
            image_url: None,
        }
    }

    fn envelope(book_id: BookId, seq: u64, event: &BookEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            book_id.0,
            "catalog.book",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn added_then_supplied_book_accumulates_stock() {
        let projection = BooksProjection::new(InMemoryStore::new());
        let book_id = BookId(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                book_id,
                1,
                &BookEvent::BookAdded(BookAdded {
                    book_id,
                    details: details(),
                    initial_stock: 2,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                book_id,
                2,
                &BookEvent::SupplyReceived(SupplyReceived {
                    book_id,
                    quantity: 7,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let rm = projection.get(&book_id).unwrap();
        assert_eq!(rm.stock_total, 9);
        assert_eq!(rm.stock_available, 9);
        assert!(!rm.is_low_stock());
    }

    #[test]
    fn duplicate_envelopes_are_skipped() {
        let projection = BooksProjection::new(InMemoryStore::new());
        let book_id = BookId(AggregateId::new());
        let added = envelope(
            book_id,
            1,
            &BookEvent::BookAdded(BookAdded {
                book_id,
                details: details(),
                initial_stock: 2,
                occurred_at: Utc::now(),
            }),
        );
        let supplied = envelope(
            book_id,
            2,
            &BookEvent::SupplyReceived(SupplyReceived {
                book_id,
                quantity: 7,
                occurred_at: Utc::now(),
            }),
        );

        projection.apply_envelope(&added).unwrap();
        projection.apply_envelope(&supplied).unwrap();
        projection.apply_envelope(&supplied).unwrap();

        assert_eq!(projection.get(&book_id).unwrap().stock_total, 9);
    }

    #[test]
    fn sequence_gaps_are_errors() {
        let projection = BooksProjection::new(InMemoryStore::new());
        let book_id = BookId(AggregateId::new());
        let err = projection
            .apply_envelope(&envelope(
                book_id,
                3,
                &BookEvent::BookAdded(BookAdded {
                    book_id,
                    details: details(),
                    initial_stock: 2,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::NonMonotonicSequence { .. }));
    }

    #[test]
    fn low_stock_lists_only_books_below_threshold() {
        let projection = BooksProjection::new(InMemoryStore::new());
        let scarce = BookId(AggregateId::new());
        let plentiful = BookId(AggregateId::new());

        for (book_id, stock) in [(scarce, 2), (plentiful, 12)] {
            projection
                .apply_envelope(&envelope(
                    book_id,
                    1,
                    &BookEvent::BookAdded(BookAdded {
                        book_id,
                        details: details(),
                        initial_stock: stock,
                        occurred_at: Utc::now(),
                    }),
                ))
                .unwrap();
        }

        let low = projection.low_stock();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].book_id, scarce);
    }
}

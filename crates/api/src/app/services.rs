//! Infrastructure wiring shared by all routes.
//!
//! One event store, one dispatcher, one projection per read model. Commits
//! are synchronous: `dispatch` appends, then applies the committed envelopes
//! to every projection before returning, so reads issued after a mutation's
//! response always see its effects.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use libram_assets::{EbookId, FsAssetStore};
use libram_catalog::{Book, BookCommand, BookId, ReceiveSupply};
use libram_core::{Aggregate, AggregateId, DomainError};
use libram_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use libram_infra::event_store::{InMemoryEventStore, StoredEvent};
use libram_infra::projections::{
    BookReadModel, BooksProjection, EbookReadModel, EbooksProjection, SupplierReadModel,
    SuppliersProjection, SupplyOrderReadModel, SupplyOrdersProjection,
};
use libram_infra::read_model::InMemoryStore;
use libram_supply::{
    OpenShortlist, Receipt, SupplyOrder, SupplyOrderCommand, SupplyOrderId,
};
use libram_suppliers::SupplierId;

use crate::app::covers::CoverSource;

type Books = BooksProjection<InMemoryStore<BookId, BookReadModel>>;
type SupplyOrders = SupplyOrdersProjection<InMemoryStore<SupplyOrderId, SupplyOrderReadModel>>;
type Suppliers = SuppliersProjection<InMemoryStore<SupplierId, SupplierReadModel>>;
type Ebooks = EbooksProjection<InMemoryStore<EbookId, EbookReadModel>>;

pub struct AppServices {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>>,
    pub books: Books,
    pub supply_orders: SupplyOrders,
    pub suppliers: Suppliers,
    pub ebooks: Ebooks,
    pub assets: FsAssetStore,
    pub covers: Arc<dyn CoverSource>,
    /// Serializes find-or-create of the singleton shortlist order so two
    /// concurrent first requests cannot open two shortlists.
    shortlist_gate: Mutex<()>,
}

pub fn build_services(asset_root: PathBuf, covers: Arc<dyn CoverSource>) -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());

    AppServices {
        dispatcher: CommandDispatcher::new(Arc::clone(&store)),
        books: BooksProjection::new(InMemoryStore::new()),
        supply_orders: SupplyOrdersProjection::new(InMemoryStore::new()),
        suppliers: SuppliersProjection::new(InMemoryStore::new()),
        ebooks: EbooksProjection::new(InMemoryStore::new()),
        assets: FsAssetStore::new(asset_root),
        covers,
        shortlist_gate: Mutex::new(()),
    }
}

impl AppServices {
    /// Dispatch a command, then fold the committed events into the read
    /// models before returning.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: libram_events::Event + Serialize + DeserializeOwned,
    {
        let committed =
            self.dispatcher
                .dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)?;
        self.project(&committed);
        Ok(committed)
    }

    /// The open shortlist order, created on first access.
    pub fn shortlist_order(&self) -> Result<SupplyOrderReadModel, DispatchError> {
        let _gate = self
            .shortlist_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(order) = self.supply_orders.shortlist() {
            return Ok(order);
        }

        let aggregate_id = AggregateId::new();
        let order_id = SupplyOrderId::new(aggregate_id);
        self.dispatch::<SupplyOrder>(
            aggregate_id,
            "supply.order",
            SupplyOrderCommand::OpenShortlist(OpenShortlist {
                order_id,
                occurred_at: Utc::now(),
            }),
            |id| SupplyOrder::empty(SupplyOrderId::new(id)),
        )?;

        self.supply_orders.shortlist().ok_or(DispatchError::NotFound)
    }

    /// Credit fusion receipts to the catalog.
    ///
    /// The supply order is already completed when this runs, and the status
    /// guard blocks re-fusion, so no receipt may be abandoned: concurrency
    /// conflicts with other book commits are retried (the dispatch reloads
    /// the stream each attempt), and any other failure is logged and the
    /// remaining receipts are still applied.
    pub fn credit_receipts(&self, order_id: SupplyOrderId, receipts: &[Receipt]) {
        const MAX_ATTEMPTS: u32 = 5;

        for receipt in receipts {
            let mut attempts = 0;
            loop {
                attempts += 1;
                let command = BookCommand::ReceiveSupply(ReceiveSupply {
                    book_id: receipt.book_id,
                    quantity: receipt.quantity,
                    occurred_at: Utc::now(),
                });
                match self.dispatch::<Book>(receipt.book_id.0, "catalog.book", command, |id| {
                    Book::empty(BookId(id))
                }) {
                    Ok(_) => break,
                    Err(DispatchError::Concurrency(msg)) if attempts < MAX_ATTEMPTS => {
                        tracing::warn!(
                            order_id = %order_id,
                            book_id = %receipt.book_id,
                            attempt = attempts,
                            error = %msg,
                            "stock credit hit a concurrent write; retrying"
                        );
                    }
                    Err(err) => {
                        tracing::error!(
                            order_id = %order_id,
                            book_id = %receipt.book_id,
                            error = ?err,
                            "stock credit failed; receipt not applied"
                        );
                        break;
                    }
                }
            }
        }
    }

    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let envelope = stored.to_envelope();
            // A projection failure after a durable append is a bug, not a
            // request error; log it and keep the commit.
            if let Err(err) = self.books.apply_envelope(&envelope) {
                tracing::error!(event_id = %stored.event_id, error = %err, "books projection failed");
            }
            if let Err(err) = self.supply_orders.apply_envelope(&envelope) {
                tracing::error!(event_id = %stored.event_id, error = %err, "supply orders projection failed");
            }
            if let Err(err) = self.suppliers.apply_envelope(&envelope) {
                tracing::error!(event_id = %stored.event_id, error = %err, "suppliers projection failed");
            }
            if let Err(err) = self.ebooks.apply_envelope(&envelope) {
                tracing::error!(event_id = %stored.event_id, error = %err, "ebooks projection failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::covers::CoverLookupError;
    use libram_supply::SupplyOrderStatus;

    struct NoCovers;

    impl CoverSource for NoCovers {
        fn lookup(&self, _title: &str, _author: &str) -> Result<Option<String>, CoverLookupError> {
            Ok(None)
        }
    }

    fn services() -> AppServices {
        let dir = tempfile::tempdir().unwrap();
        build_services(dir.path().to_path_buf(), Arc::new(NoCovers))
    }

    fn add_book(services: &AppServices, initial_stock: i64) -> BookId {
        let book_id = BookId(AggregateId::new());
        services
            .dispatch::<Book>(
                book_id.0,
                "catalog.book",
                BookCommand::AddBook(libram_catalog::AddBook {
                    book_id,
                    details: libram_catalog::BookDetails {
                        title: "Salt Roads".to_string(),
                        author: "N. Hopkinson".to_string(),
                        price_cents: 1599,
                        category: "fiction".to_string(),
                        item_type: libram_catalog::ItemType::Hybrid,
                        location: "A-4".to_string(),
                        image_url: None,
                    },
                    initial_stock,
                    occurred_at: Utc::now(),
                }),
                |id| Book::empty(BookId(id)),
            )
            .unwrap();
        book_id
    }

    #[test]
    fn credit_receipts_applies_later_receipts_after_a_failure() {
        let services = services();
        let book_id = add_book(&services, 2);
        let missing = BookId(AggregateId::new());
        let order_id = SupplyOrderId::new(AggregateId::new());

        // The first receipt targets a book that was never added; its failure
        // must not abandon the second receipt.
        services.credit_receipts(
            order_id,
            &[
                Receipt {
                    item_id: libram_supply::OrderItemId::new(AggregateId::new()),
                    book_id: missing,
                    quantity: 4,
                },
                Receipt {
                    item_id: libram_supply::OrderItemId::new(AggregateId::new()),
                    book_id,
                    quantity: 3,
                },
            ],
        );

        let book = services.books.get(&book_id).unwrap();
        assert_eq!(book.stock_total, 5);
        assert_eq!(book.stock_available, 5);
        assert!(services.books.get(&missing).is_none());
    }

    #[test]
    fn shortlist_order_is_created_once() {
        let services = services();

        let first = services.shortlist_order().unwrap();
        assert_eq!(first.status, SupplyOrderStatus::Shortlist);

        let second = services.shortlist_order().unwrap();
        assert_eq!(second.order_id, first.order_id);
        assert_eq!(services.supply_orders.list().len(), 1);
    }
}

use serde_json::Value as JsonValue;

use libram_events::EventEnvelope;
use libram_supply::{
    OrderItem, OrderItemId, SupplyOrderEvent, SupplyOrderId, SupplyOrderStatus,
};
use libram_suppliers::SupplierId;

use super::cursors::{Advance, Cursors, ProjectionError};
use crate::read_model::Store;

/// One supply order, with its items, as shown by the workflow views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyOrderReadModel {
    pub order_id: SupplyOrderId,
    pub status: SupplyOrderStatus,
    pub supplier_id: Option<SupplierId>,
    pub items: Vec<OrderItem>,
}

#[derive(Debug)]
pub struct SupplyOrdersProjection<S>
where
    S: Store<SupplyOrderId, SupplyOrderReadModel>,
{
    store: S,
    cursors: Cursors,
}

impl<S> SupplyOrdersProjection<S>
where
    S: Store<SupplyOrderId, SupplyOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, order_id: &SupplyOrderId) -> Option<SupplyOrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<SupplyOrderReadModel> {
        self.store.list()
    }

    /// The current shortlist order, if one is open. The service layer
    /// guarantees at most one.
    pub fn shortlist(&self) -> Option<SupplyOrderReadModel> {
        self.store
            .list()
            .into_iter()
            .find(|o| o.status == SupplyOrderStatus::Shortlist)
    }

    pub fn list_with_status(&self, status: SupplyOrderStatus) -> Vec<SupplyOrderReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|o| o.status == status)
            .collect()
    }

    /// Item endpoints address items without naming their order; resolve the
    /// owning order by item id.
    pub fn find_by_item(&self, item_id: OrderItemId) -> Option<SupplyOrderReadModel> {
        self.store
            .list()
            .into_iter()
            .find(|o| o.items.iter().any(|i| i.item_id == item_id))
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "supply.order" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        match self.cursors.check(aggregate_id, seq)? {
            Advance::Seen => return Ok(()),
            Advance::Fresh => {}
        }

        let ev: SupplyOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let order_id = match &ev {
            SupplyOrderEvent::ShortlistOpened(e) => e.order_id,
            SupplyOrderEvent::ItemLifted(e) => e.order_id,
            SupplyOrderEvent::ItemDropped(e) => e.order_id,
            SupplyOrderEvent::MassAdjusted(e) => e.order_id,
            SupplyOrderEvent::SubmittedForReview(e) => e.order_id,
            SupplyOrderEvent::OrderPlaced(e) => e.order_id,
            SupplyOrderEvent::PayloadAdjusted(e) => e.order_id,
            SupplyOrderEvent::InventoryFused(e) => e.order_id,
        };
        if order_id.0 != aggregate_id {
            return Err(ProjectionError::AggregateMismatch);
        }

        match ev {
            SupplyOrderEvent::ShortlistOpened(e) => {
                self.store.upsert(
                    e.order_id,
                    SupplyOrderReadModel {
                        order_id: e.order_id,
                        status: SupplyOrderStatus::Shortlist,
                        supplier_id: None,
                        items: vec![],
                    },
                );
            }
            SupplyOrderEvent::ItemLifted(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.items.push(OrderItem {
                        item_id: e.item_id,
                        book_id: e.book_id,
                        mass: e.mass,
                        payload: None,
                    });
                    self.store.upsert(e.order_id, rm);
                }
            }
            SupplyOrderEvent::ItemDropped(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.items.retain(|i| i.item_id != e.item_id);
                    self.store.upsert(e.order_id, rm);
                }
            }
            SupplyOrderEvent::MassAdjusted(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    if let Some(item) = rm.items.iter_mut().find(|i| i.item_id == e.item_id) {
                        item.mass = e.mass;
                    }
                    self.store.upsert(e.order_id, rm);
                }
            }
            SupplyOrderEvent::SubmittedForReview(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = SupplyOrderStatus::PendingReview;
                    self.store.upsert(e.order_id, rm);
                }
            }
            SupplyOrderEvent::OrderPlaced(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = SupplyOrderStatus::Placed;
                    rm.supplier_id = Some(e.supplier_id);
                    self.store.upsert(e.order_id, rm);
                }
            }
            SupplyOrderEvent::PayloadAdjusted(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    if let Some(item) = rm.items.iter_mut().find(|i| i.item_id == e.item_id) {
                        item.payload = Some(e.payload);
                    }
                    self.store.upsert(e.order_id, rm);
                }
            }
            SupplyOrderEvent::InventoryFused(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    for receipt in &e.receipts {
                        if let Some(item) =
                            rm.items.iter_mut().find(|i| i.item_id == receipt.item_id)
                        {
                            item.payload = Some(receipt.quantity);
                        }
                    }
                    rm.status = SupplyOrderStatus::Completed;
                    self.store.upsert(e.order_id, rm);
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
    use libram_catalog::BookId;
    use libram_core::AggregateId;
    use libram_supply::{ItemLifted, OrderPlaced, ShortlistOpened, SubmittedForReview};
    use uuid::Uuid;

    fn envelope(
        order_id: SupplyOrderId,
        seq: u64,
        event: &SupplyOrderEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            order_id.0,
            "supply.order",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn order_lifecycle_is_reflected() {
        let projection = SupplyOrdersProjection::new(InMemoryStore::new());
        let order_id = SupplyOrderId::new(AggregateId::new());
        let item_id = OrderItemId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                order_id,
                1,
                &SupplyOrderEvent::ShortlistOpened(ShortlistOpened {
                    order_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                order_id,
                2,
                &SupplyOrderEvent::ItemLifted(ItemLifted {
                    order_id,
                    item_id,
                    book_id: BookId(AggregateId::new()),
                    mass: 5,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert_eq!(projection.shortlist().unwrap().order_id, order_id);

        projection
            .apply_envelope(&envelope(
                order_id,
                3,
                &SupplyOrderEvent::SubmittedForReview(SubmittedForReview {
                    order_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        assert!(projection.shortlist().is_none());

        let supplier = SupplierId::new(AggregateId::new());
        projection
            .apply_envelope(&envelope(
                order_id,
                4,
                &SupplyOrderEvent::OrderPlaced(OrderPlaced {
                    order_id,
                    supplier_id: supplier,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let rm = projection.get(&order_id).unwrap();
        assert_eq!(rm.status, SupplyOrderStatus::Placed);
        assert_eq!(rm.supplier_id, Some(supplier));
        assert_eq!(projection.list_with_status(SupplyOrderStatus::Placed).len(), 1);
    }

    #[test]
    fn find_by_item_resolves_the_owning_order() {
        let projection = SupplyOrdersProjection::new(InMemoryStore::new());
        let order_id = SupplyOrderId::new(AggregateId::new());
        let item_id = OrderItemId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                order_id,
                1,
                &SupplyOrderEvent::ShortlistOpened(ShortlistOpened {
                    order_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                order_id,
                2,
                &SupplyOrderEvent::ItemLifted(ItemLifted {
                    order_id,
                    item_id,
                    book_id: BookId(AggregateId::new()),
                    mass: 5,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert_eq!(projection.find_by_item(item_id).unwrap().order_id, order_id);
        assert!(projection
            .find_by_item(OrderItemId::new(AggregateId::new()))
            .is_none());
    }
}

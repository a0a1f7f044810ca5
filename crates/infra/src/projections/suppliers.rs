use serde_json::Value as JsonValue;

use libram_events::EventEnvelope;
use libram_suppliers::{ContactInfo, SupplierEvent, SupplierId};

use super::cursors::{Advance, Cursors, ProjectionError};
use crate::read_model::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierReadModel {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
}

#[derive(Debug)]
pub struct SuppliersProjection<S>
where
    S: Store<SupplierId, SupplierReadModel>,
{
    store: S,
    cursors: Cursors,
}

impl<S> SuppliersProjection<S>
where
    S: Store<SupplierId, SupplierReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, supplier_id: &SupplierId) -> Option<SupplierReadModel> {
        self.store.get(supplier_id)
    }

    pub fn list(&self) -> Vec<SupplierReadModel> {
        let mut suppliers = self.store.list();
        suppliers.sort_by(|a, b| a.name.cmp(&b.name));
        suppliers
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "suppliers.supplier" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        match self.cursors.check(aggregate_id, seq)? {
            Advance::Seen => return Ok(()),
            Advance::Fresh => {}
        }

        let ev: SupplierEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let supplier_id = match &ev {
            SupplierEvent::SupplierRegistered(e) => e.supplier_id,
            SupplierEvent::SupplierDetailsUpdated(e) => e.supplier_id,
        };
        if supplier_id.0 != aggregate_id {
            return Err(ProjectionError::AggregateMismatch);
        }

        match ev {
            SupplierEvent::SupplierRegistered(e) => {
                self.store.upsert(
                    e.supplier_id,
                    SupplierReadModel {
                        supplier_id: e.supplier_id,
                        name: e.name,
                        contact: e.contact,
                    },
                );
            }
            SupplierEvent::SupplierDetailsUpdated(e) => {
                self.store.upsert(
                    e.supplier_id,
                    SupplierReadModel {
                        supplier_id: e.supplier_id,
                        name: e.name,
                        contact: e.contact,
                    },
                );
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

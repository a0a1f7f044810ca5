use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use libram_assets::{EbookEvent, EbookId, PLACEHOLDER_COVER_URL};
use libram_events::EventEnvelope;

use super::cursors::{Advance, Cursors, ProjectionError};
use crate::read_model::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbookReadModel {
    pub ebook_id: EbookId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub pdf_filename: String,
    pub audio_filename: Option<String>,
    pub cover_url: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl EbookReadModel {
    /// The cover to display: the uploaded one, or the placeholder.
    pub fn display_cover(&self) -> &str {
        self.cover_url.as_deref().unwrap_or(PLACEHOLDER_COVER_URL)
    }
}

#[derive(Debug)]
pub struct EbooksProjection<S>
where
    S: Store<EbookId, EbookReadModel>,
{
    store: S,
    cursors: Cursors,
}

impl<S> EbooksProjection<S>
where
    S: Store<EbookId, EbookReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, ebook_id: &EbookId) -> Option<EbookReadModel> {
        self.store.get(ebook_id)
    }

    pub fn list(&self) -> Vec<EbookReadModel> {
        let mut ebooks = self.store.list();
        ebooks.sort_by(|a, b| a.title.cmp(&b.title));
        ebooks
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "assets.ebook" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        match self.cursors.check(aggregate_id, seq)? {
            Advance::Seen => return Ok(()),
            Advance::Fresh => {}
        }

        let ev: EbookEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let ebook_id = match &ev {
            EbookEvent::EbookUploaded(e) => e.ebook_id,
            EbookEvent::EbookEdited(e) => e.ebook_id,
            EbookEvent::EbookDeleted(e) => e.ebook_id,
        };
        if ebook_id.0 != aggregate_id {
            return Err(ProjectionError::AggregateMismatch);
        }

        match ev {
            EbookEvent::EbookUploaded(e) => {
                self.store.upsert(
                    e.ebook_id,
                    EbookReadModel {
                        ebook_id: e.ebook_id,
                        title: e.title,
                        author: e.author,
                        description: e.description,
                        pdf_filename: e.pdf_filename,
                        audio_filename: e.audio_filename,
                        cover_url: e.cover_url,
                        uploaded_at: e.occurred_at,
                    },
                );
            }
            EbookEvent::EbookEdited(e) => {
                if let Some(mut rm) = self.store.get(&e.ebook_id) {
                    rm.title = e.title;
                    rm.author = e.author;
                    rm.description = e.description;
                    rm.pdf_filename = e.pdf_filename;
                    rm.audio_filename = e.audio_filename;
                    rm.cover_url = e.cover_url;
                    self.store.upsert(e.ebook_id, rm);
                }
            }
            EbookEvent::EbookDeleted(e) => {
                self.store.remove(&e.ebook_id);
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
    use libram_assets::{EbookDeleted, EbookUploaded};
    use libram_core::AggregateId;
    use uuid::Uuid;

    fn uploaded(ebook_id: EbookId) -> EbookEvent {
        EbookEvent::EbookUploaded(EbookUploaded {
            ebook_id,
            title: "The Long Autumn".to_string(),
            author: "R. Castellan".to_string(),
            description: None,
            pdf_filename: "the_long_autumn.pdf".to_string(),
            audio_filename: None,
            cover_url: None,
            occurred_at: Utc::now(),
        })
    }

    fn envelope(ebook_id: EbookId, seq: u64, event: &EbookEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            ebook_id.0,
            "assets.ebook",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn uploaded_ebook_is_listed_with_placeholder_cover() {
        let projection = EbooksProjection::new(InMemoryStore::new());
        let ebook_id = EbookId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(ebook_id, 1, &uploaded(ebook_id)))
            .unwrap();

        let rm = projection.get(&ebook_id).unwrap();
        assert_eq!(rm.display_cover(), PLACEHOLDER_COVER_URL);
    }

    #[test]
    fn deleted_ebook_disappears_from_the_listing() {
        let projection = EbooksProjection::new(InMemoryStore::new());
        let ebook_id = EbookId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(ebook_id, 1, &uploaded(ebook_id)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                ebook_id,
                2,
                &EbookEvent::EbookDeleted(EbookDeleted {
                    ebook_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert!(projection.get(&ebook_id).is_none());
        assert!(projection.list().is_empty());
    }
}

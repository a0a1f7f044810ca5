use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use libram_core::AggregateId;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),
    #[error("event aggregate id does not match envelope aggregate id")]
    AggregateMismatch,
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-stream sequence cursors for idempotent envelope application.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

pub(crate) enum Advance {
    /// Envelope already applied; skip it.
    Seen,
    /// Envelope is next in line; apply it then call `commit`.
    Fresh,
}

impl Cursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, aggregate_id: AggregateId, seq: u64) -> Result<Advance, ProjectionError> {
        let last = match self.inner.read() {
            Ok(map) => *map.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        };
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(Advance::Seen);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(Advance::Fresh)
    }

    pub fn commit(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(aggregate_id, seq);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}

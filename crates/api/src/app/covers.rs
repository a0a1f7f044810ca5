//! Cover-image backfill against a third-party book catalog.
//!
//! The catalog is reached through the [`CoverSource`] seam; the HTTP
//! implementation is a thin blocking client, run from `spawn_blocking` by the
//! backfill route. Per-book failures are logged and skipped, and every
//! successful update is committed durably before moving on, so partial
//! failures never lose progress.

use std::time::Duration;

use chrono::Utc;
use libram_catalog::{AssignCover, Book, BookCommand, BookId};

use crate::app::services::AppServices;

#[derive(Debug, thiserror::Error)]
pub enum CoverLookupError {
    #[error("cover lookup http failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cover lookup returned status {0}")]
    Status(u16),
}

/// Lookup seam for cover images; keyed by title + author.
pub trait CoverSource: Send + Sync {
    /// Returns `Ok(None)` when the catalog has no cover for the book.
    fn lookup(&self, title: &str, author: &str) -> Result<Option<String>, CoverLookupError>;
}

/// Cover source backed by a Google-Books-shaped volumes endpoint.
pub struct HttpCoverSource {
    base_url: String,
}

impl HttpCoverSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl CoverSource for HttpCoverSource {
    fn lookup(&self, title: &str, author: &str) -> Result<Option<String>, CoverLookupError> {
        // Built per call: lookups run on a blocking thread and the route is a
        // rare admin operation.
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let query = format!("intitle:{title} inauthor:{author}");
        let response = client
            .get(&self.base_url)
            .query(&[("q", query.as_str()), ("maxResults", "1")])
            .send()?;

        if !response.status().is_success() {
            return Err(CoverLookupError::Status(response.status().as_u16()));
        }

        let body: serde_json::Value = response.json()?;
        Ok(body["items"][0]["volumeInfo"]["imageLinks"]["thumbnail"]
            .as_str()
            .map(str::to_string))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillOutcome {
    pub updated: usize,
    pub skipped: usize,
}

/// Assign covers to every book that has none. Blocking; callers run it on a
/// blocking thread.
pub fn backfill_covers(services: &AppServices) -> BackfillOutcome {
    let mut outcome = BackfillOutcome::default();

    for book in services.books.list() {
        if book.image_url.is_some() {
            outcome.skipped += 1;
            continue;
        }

        let url = match services.covers.lookup(&book.title, &book.author) {
            Ok(Some(url)) => url,
            Ok(None) => {
                tracing::warn!(book_id = %book.book_id, title = %book.title, "no cover found; skipping");
                outcome.skipped += 1;
                continue;
            }
            Err(err) => {
                tracing::warn!(book_id = %book.book_id, title = %book.title, error = %err, "cover lookup failed; skipping");
                outcome.skipped += 1;
                continue;
            }
        };

        let command = BookCommand::AssignCover(AssignCover {
            book_id: book.book_id,
            url,
            occurred_at: Utc::now(),
        });
        match services.dispatch::<Book>(book.book_id.0, "catalog.book", command, |id| {
            Book::empty(BookId(id))
        }) {
            Ok(_) => {
                outcome.updated += 1;
                if outcome.updated % 5 == 0 {
                    tracing::info!(updated = outcome.updated, "cover backfill progress");
                }
            }
            Err(err) => {
                tracing::warn!(book_id = %book.book_id, error = ?err, "cover assignment failed; skipping");
                outcome.skipped += 1;
            }
        }
    }

    tracing::info!(
        updated = outcome.updated,
        skipped = outcome.skipped,
        "cover backfill finished"
    );
    outcome
}

//! Read-model projections.
//!
//! Each projection consumes committed event envelopes and maintains one
//! key/value read model. Envelopes are deduplicated per stream through a
//! sequence-number cursor, so re-applying an already-seen envelope is a
//! no-op and gaps are surfaced as errors.

mod books;
mod cursors;
mod ebooks;
mod suppliers;
mod supply_orders;

pub use books::{BookReadModel, BooksProjection};
pub use cursors::ProjectionError;
pub use ebooks::{EbookReadModel, EbooksProjection};
pub use suppliers::{SupplierReadModel, SuppliersProjection};
pub use supply_orders::{SupplyOrderReadModel, SupplyOrdersProjection};

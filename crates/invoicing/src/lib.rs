//! Read-side documents for a placed supply order: the supplier confirmation
//! message and the downloadable PDF invoice. Both are pure functions of the
//! order snapshot.

pub mod document;
pub mod message;

pub use document::render_invoice_pdf;
pub use message::confirmation_message;

use serde::{Deserialize, Serialize};

use libram_supply::SupplyOrderId;

/// One invoice line: a book title and the quantity requested from the
/// supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub title: String,
    pub mass: i64,
}

/// Snapshot of a placed order, as needed by the invoice documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceOrder {
    pub order_id: SupplyOrderId,
    pub supplier_name: String,
    pub lines: Vec<InvoiceLine>,
}

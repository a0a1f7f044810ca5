use serde::Deserialize;

use libram_infra::projections::{
    BookReadModel, EbookReadModel, SupplierReadModel, SupplyOrderReadModel,
};
use libram_suppliers::ContactInfo;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddBookRequest {
    pub title: String,
    pub author: String,
    pub price_cents: u64,
    pub category: String,
    pub item_type: String,
    pub location: String,
    pub image_url: Option<String>,
    pub initial_stock: i64,
}

/// Full replacement of the book's descriptive fields (stock moves only via
/// restock/supply).
#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    pub title: String,
    pub author: String,
    pub price_cents: u64,
    pub category: String,
    pub item_type: String,
    pub location: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSupplierRequest {
    pub name: String,
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSupplierRequest {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub supplier_id: String,
}

// -------------------------
// Read-model JSON mapping
// -------------------------

pub fn book_to_json(rm: BookReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.book_id.to_string(),
        "title": rm.title,
        "author": rm.author,
        "price_cents": rm.price_cents,
        "category": rm.category,
        "item_type": rm.item_type,
        "location": rm.location,
        "image_url": rm.image_url,
        "stock_total": rm.stock_total,
        "stock_available": rm.stock_available,
        "stock_borrowed": rm.stock_borrowed,
        "stock_sold": rm.stock_sold,
        "low_stock": rm.is_low_stock(),
    })
}

/// Order view JSON; `title_of` resolves book titles for display.
pub fn order_to_json(
    rm: &SupplyOrderReadModel,
    title_of: impl Fn(libram_catalog::BookId) -> Option<String>,
) -> serde_json::Value {
    serde_json::json!({
        "id": rm.order_id.to_string(),
        "status": rm.status.as_str(),
        "supplier_id": rm.supplier_id.map(|s| s.to_string()),
        "items": rm.items.iter().map(|i| serde_json::json!({
            "item_id": i.item_id.to_string(),
            "book_id": i.book_id.to_string(),
            "title": title_of(i.book_id),
            "mass": i.mass,
            "payload": i.payload,
            "received_quantity": i.received_quantity(),
        })).collect::<Vec<_>>(),
    })
}

pub fn supplier_to_json(rm: SupplierReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.supplier_id.to_string(),
        "name": rm.name,
        "contact": {
            "email": rm.contact.email,
            "phone": rm.contact.phone,
        },
    })
}

pub fn ebook_to_json(rm: &EbookReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.ebook_id.to_string(),
        "title": rm.title,
        "author": rm.author,
        "description": rm.description,
        "pdf_filename": rm.pdf_filename,
        "audio_filename": rm.audio_filename,
        "cover_url": rm.display_cover(),
        "uploaded_at": rm.uploaded_at.to_rfc3339(),
    })
}

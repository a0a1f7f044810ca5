//! Catalog domain module (Books, event-sourced).
//!
//! This crate contains business rules for the book catalog, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod book;

pub use book::{
    AddBook, AssignCover, Book, BookAdded, BookCommand, BookDetails, BookDetailsUpdated, BookEvent, BookId,
    BookRestocked, CoverAssigned, ItemType, ReceiveSupply, RestockBook, SupplyReceived,
    UpdateBookDetails, LOW_STOCK_THRESHOLD,
};

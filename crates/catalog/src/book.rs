use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use libram_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use libram_events::Event;

/// Books with `stock_available` strictly below this qualify for the
/// restocking shortlist.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Book identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub AggregateId);

impl BookId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BookId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How a title can leave the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Borrow only.
    Circulation,
    /// Sale only.
    Sale,
    /// Both.
    Hybrid,
}

/// Mutable catalog metadata, grouped so details updates stay one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    /// Price in the smallest currency unit.
    pub price_cents: u64,
    pub category: String,
    pub item_type: ItemType,
    pub location: String,
    pub image_url: Option<String>,
}

/// Aggregate root: Book.
///
/// Invariant: `stock_available <= stock_total`, enforced by every command
/// handler that touches stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    id: BookId,
    details: BookDetails,
    stock_total: i64,
    stock_available: i64,
    stock_borrowed: i64,
    stock_sold: i64,
    version: u64,
    created: bool,
}

impl Book {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BookId) -> Self {
        Self {
            id,
            details: BookDetails {
                title: String::new(),
                author: String::new(),
                price_cents: 0,
                category: String::new(),
                item_type: ItemType::Circulation,
                location: String::new(),
                image_url: None,
            },
            stock_total: 0,
            stock_available: 0,
            stock_borrowed: 0,
            stock_sold: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BookId {
        self.id
    }

    pub fn details(&self) -> &BookDetails {
        &self.details
    }

    pub fn stock_total(&self) -> i64 {
        self.stock_total
    }

    pub fn stock_available(&self) -> i64 {
        self.stock_available
    }

    pub fn stock_borrowed(&self) -> i64 {
        self.stock_borrowed
    }

    pub fn stock_sold(&self) -> i64 {
        self.stock_sold
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_available < LOW_STOCK_THRESHOLD
    }
}

impl AggregateRoot for Book {
    type Id = BookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddBook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBook {
    pub book_id: BookId,
    pub details: BookDetails,
    /// Opening stock; both total and available start here.
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateBookDetails (metadata only; stock moves via restock/supply).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBookDetails {
    pub book_id: BookId,
    pub details: BookDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestockBook (manual staff restock; quantity >= 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockBook {
    pub book_id: BookId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveSupply (supply-order fusion delta; quantity >= 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveSupply {
    pub book_id: BookId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignCover (cover-image backfill).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignCover {
    pub book_id: BookId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookCommand {
    AddBook(AddBook),
    UpdateBookDetails(UpdateBookDetails),
    RestockBook(RestockBook),
    ReceiveSupply(ReceiveSupply),
    AssignCover(AssignCover),
}

/// Event: BookAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookAdded {
    pub book_id: BookId,
    pub details: BookDetails,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetailsUpdated {
    pub book_id: BookId,
    pub details: BookDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookRestocked (manual restock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRestocked {
    pub book_id: BookId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplyReceived (quantity folded in at fusion time; raises both
/// total and available stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyReceived {
    pub book_id: BookId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CoverAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverAssigned {
    pub book_id: BookId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookEvent {
    BookAdded(BookAdded),
    BookDetailsUpdated(BookDetailsUpdated),
    BookRestocked(BookRestocked),
    SupplyReceived(SupplyReceived),
    CoverAssigned(CoverAssigned),
}

impl Event for BookEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookEvent::BookAdded(_) => "catalog.book.added",
            BookEvent::BookDetailsUpdated(_) => "catalog.book.details_updated",
            BookEvent::BookRestocked(_) => "catalog.book.restocked",
            BookEvent::SupplyReceived(_) => "catalog.book.supply_received",
            BookEvent::CoverAssigned(_) => "catalog.book.cover_assigned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookEvent::BookAdded(e) => e.occurred_at,
            BookEvent::BookDetailsUpdated(e) => e.occurred_at,
            BookEvent::BookRestocked(e) => e.occurred_at,
            BookEvent::SupplyReceived(e) => e.occurred_at,
            BookEvent::CoverAssigned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Book {
    type Command = BookCommand;
    type Event = BookEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BookEvent::BookAdded(e) => {
                self.id = e.book_id;
                self.details = e.details.clone();
                self.stock_total = e.initial_stock;
                self.stock_available = e.initial_stock;
                self.stock_borrowed = 0;
                self.stock_sold = 0;
                self.created = true;
            }
            BookEvent::BookDetailsUpdated(e) => {
                self.details = e.details.clone();
            }
            BookEvent::BookRestocked(e) => {
                self.stock_total += e.quantity;
                self.stock_available += e.quantity;
            }
            BookEvent::SupplyReceived(e) => {
                self.stock_total += e.quantity;
                self.stock_available += e.quantity;
            }
            BookEvent::CoverAssigned(e) => {
                self.details.image_url = Some(e.url.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BookCommand::AddBook(cmd) => self.handle_add(cmd),
            BookCommand::UpdateBookDetails(cmd) => self.handle_update(cmd),
            BookCommand::RestockBook(cmd) => self.handle_restock(cmd),
            BookCommand::ReceiveSupply(cmd) => self.handle_receive_supply(cmd),
            BookCommand::AssignCover(cmd) => self.handle_assign_cover(cmd),
        }
    }
}

impl Book {
    fn ensure_book_id(&self, book_id: BookId) -> Result<(), DomainError> {
        if self.id != book_id {
            return Err(DomainError::invariant("book_id mismatch"));
        }
        Ok(())
    }

    fn validate_details(details: &BookDetails) -> Result<(), DomainError> {
        if details.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if details.author.trim().is_empty() {
            return Err(DomainError::validation("author cannot be empty"));
        }
        Ok(())
    }

    fn handle_add(&self, cmd: &AddBook) -> Result<Vec<BookEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("book already exists"));
        }
        Self::validate_details(&cmd.details)?;
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }

        Ok(vec![BookEvent::BookAdded(BookAdded {
            book_id: cmd.book_id,
            details: cmd.details.clone(),
            initial_stock: cmd.initial_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateBookDetails) -> Result<Vec<BookEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_book_id(cmd.book_id)?;
        Self::validate_details(&cmd.details)?;

        Ok(vec![BookEvent::BookDetailsUpdated(BookDetailsUpdated {
            book_id: cmd.book_id,
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restock(&self, cmd: &RestockBook) -> Result<Vec<BookEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_book_id(cmd.book_id)?;

        if cmd.quantity < 1 {
            return Err(DomainError::validation("restock quantity must be at least 1"));
        }

        Ok(vec![BookEvent::BookRestocked(BookRestocked {
            book_id: cmd.book_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_supply(&self, cmd: &ReceiveSupply) -> Result<Vec<BookEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_book_id(cmd.book_id)?;

        if cmd.quantity < 0 {
            return Err(DomainError::validation("received quantity cannot be negative"));
        }
        // A zero payload means nothing arrived for this line; no event.
        if cmd.quantity == 0 {
            return Ok(vec![]);
        }

        Ok(vec![BookEvent::SupplyReceived(SupplyReceived {
            book_id: cmd.book_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_cover(&self, cmd: &AssignCover) -> Result<Vec<BookEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_book_id(cmd.book_id)?;

        if cmd.url.trim().is_empty() {
            return Err(DomainError::validation("cover url cannot be empty"));
        }

        Ok(vec![BookEvent::CoverAssigned(CoverAssigned {
            book_id: cmd.book_id,
            url: cmd.url.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use libram_catalog::BookId;
use libram_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use libram_events::Event;
use libram_suppliers::SupplierId;

/// Requested quantity assigned to items added by the low-stock scan.
pub const DEFAULT_MASS: i64 = 5;

/// Supply order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplyOrderId(pub AggregateId);

impl SupplyOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplyOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order item identifier. Items are addressable on their own (drop and
/// adjustment endpoints take only the item id), so ids are globally unique.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItemId(pub AggregateId);

impl OrderItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyOrderStatus {
    Shortlist,
    PendingReview,
    Placed,
    Completed,
}

impl SupplyOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplyOrderStatus::Shortlist => "shortlist",
            SupplyOrderStatus::PendingReview => "pending_review",
            SupplyOrderStatus::Placed => "placed",
            SupplyOrderStatus::Completed => "completed",
        }
    }
}

/// Direction of a unit adjustment to mass or payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustDirection {
    Increase,
    Decrease,
}

/// A line on a supply order.
///
/// `mass` is the quantity requested from the supplier (floor 1). `payload` is
/// the quantity actually received, unset until recorded during receiving
/// (floor 0 once set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: OrderItemId,
    pub book_id: BookId,
    pub mass: i64,
    pub payload: Option<i64>,
}

impl OrderItem {
    /// The quantity counted into inventory at fusion: the recorded payload
    /// when one exists, otherwise the requested mass.
    pub fn received_quantity(&self) -> i64 {
        self.payload.unwrap_or(self.mass)
    }
}

/// A book proposed for the shortlist, with a pre-allocated item id. The scan
/// skips candidates whose book is already on the order, so unused ids are
/// simply discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortlistCandidate {
    pub item_id: OrderItemId,
    pub book_id: BookId,
}

/// Quantity credited to one book by inventory fusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub item_id: OrderItemId,
    pub book_id: BookId,
    pub quantity: i64,
}

/// Aggregate root: SupplyOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyOrder {
    id: SupplyOrderId,
    status: SupplyOrderStatus,
    supplier_id: Option<SupplierId>,
    items: Vec<OrderItem>,
    version: u64,
    created: bool,
}

impl SupplyOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SupplyOrderId) -> Self {
        Self {
            id,
            status: SupplyOrderStatus::Shortlist,
            supplier_id: None,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplyOrderId {
        self.id
    }

    pub fn status(&self) -> SupplyOrderStatus {
        self.status
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn contains_book(&self, book_id: BookId) -> bool {
        self.items.iter().any(|i| i.book_id == book_id)
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for SupplyOrder {
    type Id = SupplyOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenShortlist. Creates the order in `shortlist` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenShortlist {
    pub order_id: SupplyOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ScanLowStock. Adds one default-mass item per candidate whose book
/// is not yet on the order. Repeating a scan with the same candidates is a
/// no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLowStock {
    pub order_id: SupplyOrderId,
    pub candidates: Vec<ShortlistCandidate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LiftBook. Manually adds a single book to the shortlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftBook {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub book_id: BookId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DropItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropItem {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustMass. Unit increment/decrement of the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustMass {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub direction: AdjustDirection,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitForReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitForReview {
    pub order_id: SupplyOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LaunchOrder. Authorizes the reviewed order and attaches the
/// chosen supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOrder {
    pub order_id: SupplyOrderId,
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustPayload. Unit increment/decrement of the received quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustPayload {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub direction: AdjustDirection,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FuseInventory. Resolves received quantities and completes the
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuseInventory {
    pub order_id: SupplyOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyOrderCommand {
    OpenShortlist(OpenShortlist),
    ScanLowStock(ScanLowStock),
    LiftBook(LiftBook),
    DropItem(DropItem),
    AdjustMass(AdjustMass),
    SubmitForReview(SubmitForReview),
    LaunchOrder(LaunchOrder),
    AdjustPayload(AdjustPayload),
    FuseInventory(FuseInventory),
}

/// Event: ShortlistOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortlistOpened {
    pub order_id: SupplyOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemLifted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLifted {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub book_id: BookId,
    pub mass: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDropped {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MassAdjusted. Carries the post-adjustment value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassAdjusted {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub mass: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SubmittedForReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedForReview {
    pub order_id: SupplyOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: SupplyOrderId,
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PayloadAdjusted. Carries the post-adjustment value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadAdjusted {
    pub order_id: SupplyOrderId,
    pub item_id: OrderItemId,
    pub payload: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InventoryFused. Receipts carry the resolved quantity per item so
/// projections and the catalog never re-derive the payload fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFused {
    pub order_id: SupplyOrderId,
    pub receipts: Vec<Receipt>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyOrderEvent {
    ShortlistOpened(ShortlistOpened),
    ItemLifted(ItemLifted),
    ItemDropped(ItemDropped),
    MassAdjusted(MassAdjusted),
    SubmittedForReview(SubmittedForReview),
    OrderPlaced(OrderPlaced),
    PayloadAdjusted(PayloadAdjusted),
    InventoryFused(InventoryFused),
}

impl Event for SupplyOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplyOrderEvent::ShortlistOpened(_) => "supply.order.shortlist_opened",
            SupplyOrderEvent::ItemLifted(_) => "supply.order.item_lifted",
            SupplyOrderEvent::ItemDropped(_) => "supply.order.item_dropped",
            SupplyOrderEvent::MassAdjusted(_) => "supply.order.mass_adjusted",
            SupplyOrderEvent::SubmittedForReview(_) => "supply.order.submitted_for_review",
            SupplyOrderEvent::OrderPlaced(_) => "supply.order.placed",
            SupplyOrderEvent::PayloadAdjusted(_) => "supply.order.payload_adjusted",
            SupplyOrderEvent::InventoryFused(_) => "supply.order.inventory_fused",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplyOrderEvent::ShortlistOpened(e) => e.occurred_at,
            SupplyOrderEvent::ItemLifted(e) => e.occurred_at,
            SupplyOrderEvent::ItemDropped(e) => e.occurred_at,
            SupplyOrderEvent::MassAdjusted(e) => e.occurred_at,
            SupplyOrderEvent::SubmittedForReview(e) => e.occurred_at,
            SupplyOrderEvent::OrderPlaced(e) => e.occurred_at,
            SupplyOrderEvent::PayloadAdjusted(e) => e.occurred_at,
            SupplyOrderEvent::InventoryFused(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SupplyOrder {
    type Command = SupplyOrderCommand;
    type Event = SupplyOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplyOrderEvent::ShortlistOpened(e) => {
                self.id = e.order_id;
                self.status = SupplyOrderStatus::Shortlist;
                self.supplier_id = None;
                self.items.clear();
                self.created = true;
            }
            SupplyOrderEvent::ItemLifted(e) => {
                self.items.push(OrderItem {
                    item_id: e.item_id,
                    book_id: e.book_id,
                    mass: e.mass,
                    payload: None,
                });
            }
            SupplyOrderEvent::ItemDropped(e) => {
                self.items.retain(|i| i.item_id != e.item_id);
            }
            SupplyOrderEvent::MassAdjusted(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.item_id == e.item_id) {
                    item.mass = e.mass;
                }
            }
            SupplyOrderEvent::SubmittedForReview(_) => {
                self.status = SupplyOrderStatus::PendingReview;
            }
            SupplyOrderEvent::OrderPlaced(e) => {
                self.status = SupplyOrderStatus::Placed;
                self.supplier_id = Some(e.supplier_id);
            }
            SupplyOrderEvent::PayloadAdjusted(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.item_id == e.item_id) {
                    item.payload = Some(e.payload);
                }
            }
            SupplyOrderEvent::InventoryFused(e) => {
                // Backfill unset payloads with the resolved quantity so the
                // completed order records what was actually counted in.
                for receipt in &e.receipts {
                    if let Some(item) =
                        self.items.iter_mut().find(|i| i.item_id == receipt.item_id)
                    {
                        item.payload = Some(receipt.quantity);
                    }
                }
                self.status = SupplyOrderStatus::Completed;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplyOrderCommand::OpenShortlist(cmd) => self.handle_open(cmd),
            SupplyOrderCommand::ScanLowStock(cmd) => self.handle_scan(cmd),
            SupplyOrderCommand::LiftBook(cmd) => self.handle_lift(cmd),
            SupplyOrderCommand::DropItem(cmd) => self.handle_drop(cmd),
            SupplyOrderCommand::AdjustMass(cmd) => self.handle_adjust_mass(cmd),
            SupplyOrderCommand::SubmitForReview(cmd) => self.handle_submit(cmd),
            SupplyOrderCommand::LaunchOrder(cmd) => self.handle_launch(cmd),
            SupplyOrderCommand::AdjustPayload(cmd) => self.handle_adjust_payload(cmd),
            SupplyOrderCommand::FuseInventory(cmd) => self.handle_fuse(cmd),
        }
    }
}

impl SupplyOrder {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: SupplyOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    /// Items can only be added or removed while the order is still being
    /// assembled or reviewed.
    fn ensure_editable(&self) -> Result<(), DomainError> {
        match self.status {
            SupplyOrderStatus::Shortlist | SupplyOrderStatus::PendingReview => Ok(()),
            _ => Err(DomainError::invariant(
                "order items can only be changed while in shortlist or pending_review",
            )),
        }
    }

    fn find_item(&self, item_id: OrderItemId) -> Result<&OrderItem, DomainError> {
        self.item(item_id).ok_or(DomainError::NotFound)
    }

    fn handle_open(&self, cmd: &OpenShortlist) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        Ok(vec![SupplyOrderEvent::ShortlistOpened(ShortlistOpened {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_scan(&self, cmd: &ScanLowStock) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        if self.status != SupplyOrderStatus::Shortlist {
            return Err(DomainError::invariant(
                "low-stock scan only applies to the shortlist order",
            ));
        }

        // Skip books already shortlisted; a repeated scan emits nothing.
        let events = cmd
            .candidates
            .iter()
            .filter(|c| !self.contains_book(c.book_id))
            .map(|c| {
                SupplyOrderEvent::ItemLifted(ItemLifted {
                    order_id: cmd.order_id,
                    item_id: c.item_id,
                    book_id: c.book_id,
                    mass: DEFAULT_MASS,
                    occurred_at: cmd.occurred_at,
                })
            })
            .collect();

        Ok(events)
    }

    fn handle_lift(&self, cmd: &LiftBook) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        if self.status != SupplyOrderStatus::Shortlist {
            return Err(DomainError::invariant(
                "books can only be lifted onto the shortlist order",
            ));
        }

        if self.contains_book(cmd.book_id) {
            return Err(DomainError::conflict("book is already on the shortlist"));
        }

        Ok(vec![SupplyOrderEvent::ItemLifted(ItemLifted {
            order_id: cmd.order_id,
            item_id: cmd.item_id,
            book_id: cmd.book_id,
            mass: DEFAULT_MASS,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_drop(&self, cmd: &DropItem) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_editable()?;
        self.find_item(cmd.item_id)?;

        Ok(vec![SupplyOrderEvent::ItemDropped(ItemDropped {
            order_id: cmd.order_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_mass(&self, cmd: &AdjustMass) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_editable()?;
        let item = self.find_item(cmd.item_id)?;

        let new_mass = match cmd.direction {
            AdjustDirection::Increase => item.mass + 1,
            AdjustDirection::Decrease => {
                if item.mass <= 1 {
                    // Floor: a decrement at 1 changes nothing.
                    return Ok(vec![]);
                }
                item.mass - 1
            }
        };

        Ok(vec![SupplyOrderEvent::MassAdjusted(MassAdjusted {
            order_id: cmd.order_id,
            item_id: cmd.item_id,
            mass: new_mass,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitForReview) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        if self.status != SupplyOrderStatus::Shortlist {
            return Err(DomainError::invariant(
                "only the shortlist order can be submitted for review",
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot submit an empty shortlist for review",
            ));
        }

        Ok(vec![SupplyOrderEvent::SubmittedForReview(
            SubmittedForReview {
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_launch(&self, cmd: &LaunchOrder) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        if self.status != SupplyOrderStatus::PendingReview {
            return Err(DomainError::invariant(
                "only a pending_review order can be placed",
            ));
        }

        Ok(vec![SupplyOrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            supplier_id: cmd.supplier_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_payload(
        &self,
        cmd: &AdjustPayload,
    ) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        if self.status != SupplyOrderStatus::Placed {
            return Err(DomainError::invariant(
                "received quantities can only be recorded on a placed order",
            ));
        }
        let item = self.find_item(cmd.item_id)?;

        // The first adjustment starts from the requested mass.
        let base = item.received_quantity();
        let new_payload = match cmd.direction {
            AdjustDirection::Increase => base + 1,
            AdjustDirection::Decrease => {
                if base <= 0 {
                    // Floor: a decrement at 0 changes nothing.
                    return Ok(vec![]);
                }
                base - 1
            }
        };

        Ok(vec![SupplyOrderEvent::PayloadAdjusted(PayloadAdjusted {
            order_id: cmd.order_id,
            item_id: cmd.item_id,
            payload: new_payload,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fuse(&self, cmd: &FuseInventory) -> Result<Vec<SupplyOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        if self.status != SupplyOrderStatus::Placed {
            return Err(DomainError::invariant(
                "only a placed order can be fused into inventory",
            ));
        }

        // Resolve the payload fallback exactly once, here.
        let receipts = self
            .items
            .iter()
            .map(|item| Receipt {
                item_id: item.item_id,
                book_id: item.book_id,
                quantity: item.received_quantity(),
            })
            .collect();

        Ok(vec![SupplyOrderEvent::InventoryFused(InventoryFused {
            order_id: cmd.order_id,
            receipts,
            occurred_at: cmd.occurred_at,
        })])
    }
}

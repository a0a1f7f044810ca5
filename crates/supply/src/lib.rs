//! Supply-order domain module: the restocking workflow.
//!
//! A supply order moves through `shortlist -> pending_review -> placed ->
//! completed`. Items carry a requested quantity (`mass`) and, once the order
//! is placed, a received quantity (`payload`). Inventory fusion resolves the
//! two into stock deltas for the catalog and completes the order.

pub mod order;

pub use order::{
    AdjustDirection, AdjustMass, AdjustPayload, DropItem, FuseInventory, InventoryFused,
    ItemDropped, ItemLifted, LaunchOrder, LiftBook, MassAdjusted, OpenShortlist, OrderItem,
    OrderItemId, OrderPlaced, PayloadAdjusted, Receipt, ScanLowStock, ShortlistCandidate,
    ShortlistOpened, SubmitForReview, SubmittedForReview, SupplyOrder, SupplyOrderCommand,
    SupplyOrderEvent, SupplyOrderId, SupplyOrderStatus, DEFAULT_MASS,
};

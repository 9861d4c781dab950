//! Marketplace settlement.
//!
//! Moves tokens from a buyer to the sellers of the listings being bought and
//! decrements listing stock, as a single atomic unit:
//! - [`SettlementManager::purchase`]: one listing, any quantity
//! - [`SettlementManager::purchase_batch`]: a cart of listings, one unit each
//! - [`SettlementManager::checkout`]: a cart with quantities, recorded as a PAID order
//!
//! Validation happens in [`SettlementPlan::build`] over locked rows, so either
//! every line of a cart settles or none does.

pub mod manager;
pub mod models;
pub mod plan;

pub use manager::SettlementManager;
pub use models::{
    Address, CardListing, CheckoutItem, ListingStatus, Order, OrderItem, OrderItemStatus,
    OrderStatus, PurchaseReceipt, Sale, ShippingSnapshot,
};
pub use plan::{PlannedItem, SettlementPlan};

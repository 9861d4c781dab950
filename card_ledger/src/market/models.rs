//! Marketplace data models.

use crate::errors::{UnknownVariant, decode_enum};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

/// Listing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Sold => "SOLD",
            ListingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for ListingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ListingStatus::Active),
            "SOLD" => Ok(ListingStatus::Sold),
            "CANCELLED" => Ok(ListingStatus::Cancelled),
            other => Err(UnknownVariant::new("listing status", other)),
        }
    }
}

/// Card offered for sale
///
/// Listings are created and edited by the catalog; settlement only reads them
/// and decrements their stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardListing {
    pub id: i64,
    pub seller_id: i64,
    pub buyer_id: Option<i64>,
    pub card_id: String,
    pub card_name: String,
    pub card_image: String,
    pub condition: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i32,
    pub status: ListingStatus,
    pub sold_at: Option<DateTime<Utc>>,
}

impl CardListing {
    pub(crate) const COLUMNS: &'static str = "id, seller_id, buyer_id, card_id, card_name, \
        card_image, condition, price, quantity, status, sold_at";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            seller_id: row.try_get("seller_id")?,
            buyer_id: row.try_get("buyer_id")?,
            card_id: row.try_get("card_id")?,
            card_name: row.try_get("card_name")?,
            card_image: row.try_get("card_image")?,
            condition: row.try_get("condition")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
            status: decode_enum(row.try_get("status")?)?,
            sold_at: row.try_get("sold_at")?,
        })
    }
}

/// Shipping address owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub cep: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

impl Address {
    pub(crate) const COLUMNS: &'static str =
        "id, user_id, name, cep, street, number, complement, neighborhood, city, state";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            cep: row.try_get("cep")?,
            street: row.try_get("street")?,
            number: row.try_get("number")?,
            complement: row.try_get("complement")?,
            neighborhood: row.try_get("neighborhood")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
        })
    }
}

/// Order status
///
/// Checkout creates orders as PAID; later states belong to fulfilment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Preparing,
    Shipped,
    Delivered,
    Received,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Disputed => "DISPUTED",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(OrderStatus::PendingPayment),
            "PAID" => Ok(OrderStatus::Paid),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "RECEIVED" => Ok(OrderStatus::Received),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "DISPUTED" => Ok(OrderStatus::Disputed),
            other => Err(UnknownVariant::new("order status", other)),
        }
    }
}

/// Fulfilment status of a single order item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderItemStatus {
    Pending,
    Preparing,
    Shipped,
    Delivered,
    Received,
    Cancelled,
}

impl OrderItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderItemStatus::Pending => "PENDING",
            OrderItemStatus::Preparing => "PREPARING",
            OrderItemStatus::Shipped => "SHIPPED",
            OrderItemStatus::Delivered => "DELIVERED",
            OrderItemStatus::Received => "RECEIVED",
            OrderItemStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderItemStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderItemStatus::Pending),
            "PREPARING" => Ok(OrderItemStatus::Preparing),
            "SHIPPED" => Ok(OrderItemStatus::Shipped),
            "DELIVERED" => Ok(OrderItemStatus::Delivered),
            "RECEIVED" => Ok(OrderItemStatus::Received),
            "CANCELLED" => Ok(OrderItemStatus::Cancelled),
            _ => Err(UnknownVariant::new("order item status", s)),
        }
    }
}

/// Line of an order, with a snapshot of the card as it was sold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: Uuid,
    pub listing_id: Option<i64>,
    pub seller_id: i64,
    pub card_id: String,
    pub card_name: String,
    pub card_image: String,
    pub condition: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub status: OrderItemStatus,
    pub tracking_code: String,
}

impl OrderItem {
    pub(crate) const COLUMNS: &'static str = "id, order_id, listing_id, seller_id, card_id, \
        card_name, card_image, condition, quantity, unit_price, total_price, status, tracking_code";

    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            listing_id: row.try_get("listing_id")?,
            seller_id: row.try_get("seller_id")?,
            card_id: row.try_get("card_id")?,
            card_name: row.try_get("card_name")?,
            card_image: row.try_get("card_image")?,
            condition: row.try_get("condition")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            total_price: row.try_get("total_price")?,
            status: decode_enum(row.try_get("status")?)?,
            tracking_code: row.try_get("tracking_code")?,
        })
    }
}

/// Shipping destination copied onto an order at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSnapshot {
    pub name: String,
    pub cep: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

impl From<Address> for ShippingSnapshot {
    fn from(address: Address) -> Self {
        Self {
            name: address.name,
            cep: address.cep,
            street: address.street,
            number: address.number,
            complement: address.complement,
            neighborhood: address.neighborhood,
            city: address.city,
            state: address.state,
        }
    }
}

/// Order created by checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: i64,
    pub shipping: ShippingSnapshot,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub tracking_code: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub(crate) const COLUMNS: &'static str = "id, buyer_id, shipping_name, shipping_cep, \
        shipping_street, shipping_number, shipping_complement, shipping_neighborhood, \
        shipping_city, shipping_state, total, status, tracking_code, created_at, paid_at";

    /// Decode the order header; items are loaded separately
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            buyer_id: row.try_get("buyer_id")?,
            shipping: ShippingSnapshot {
                name: row.try_get("shipping_name")?,
                cep: row.try_get("shipping_cep")?,
                street: row.try_get("shipping_street")?,
                number: row.try_get("shipping_number")?,
                complement: row.try_get("shipping_complement")?,
                neighborhood: row.try_get("shipping_neighborhood")?,
                city: row.try_get("shipping_city")?,
                state: row.try_get("shipping_state")?,
            },
            total: row.try_get("total")?,
            status: decode_enum(row.try_get("status")?)?,
            tracking_code: row.try_get("tracking_code")?,
            created_at: row.try_get("created_at")?,
            paid_at: row.try_get("paid_at")?,
            items: Vec::new(),
        })
    }

    /// Short reference used in transaction descriptions
    pub fn short_id(&self) -> String {
        short_order_id(self.id)
    }
}

/// First eight characters of an order id
pub fn short_order_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Order item as seen by the seller, with buyer and order context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub item: OrderItem,
    pub buyer_id: i64,
    pub buyer_username: String,
    pub shipping: ShippingSnapshot,
    pub ordered_at: DateTime<Utc>,
}

/// One line of a checkout cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub listing_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

impl CheckoutItem {
    pub fn new(listing_id: i64, quantity: i32) -> Self {
        Self {
            listing_id,
            quantity,
        }
    }
}

fn default_quantity() -> i32 {
    1
}

/// Outcome of a settled purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Buyer balance after the settlement
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_paid: Decimal,
    /// Card names in settlement order
    pub cards: Vec<String>,
    /// Present for checkouts
    pub order_id: Option<Uuid>,
}

//! Settlement manager: purchase, cart purchase and checkout.

use super::{
    models::{
        Address, CardListing, CheckoutItem, Order, OrderItem, OrderItemStatus, OrderStatus,
        PurchaseReceipt, Sale, ShippingSnapshot, short_order_id,
    },
    plan::{PlannedItem, SettlementPlan, validate_cart_shape},
};
use crate::{
    config::LedgerConfig,
    db::{begin_atomic, timeouts::bounded},
    errors::{LedgerError, LedgerResult, Resource},
    wallet::{
        AuditInfo, TransactionType,
        ledger::{self, NewTransaction},
    },
};
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Settlement manager
///
/// Every settlement is one atomic unit. Listing rows are locked in ascending
/// id order, then the buyer and seller wallets in ascending user id order,
/// before the cart is validated. Nothing is written until validation passes.
#[derive(Clone)]
pub struct SettlementManager {
    pool: Arc<PgPool>,
    config: Arc<LedgerConfig>,
}

impl SettlementManager {
    /// Create a new settlement manager
    pub fn new(pool: Arc<PgPool>, config: Arc<LedgerConfig>) -> Self {
        Self { pool, config }
    }

    /// Buy `quantity` units of one listing
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidQuantity` - Quantity below one
    /// * `LedgerError::ListingUnavailable` - Listing missing or not ACTIVE
    /// * `LedgerError::SelfPurchase` - Buyer is the seller
    /// * `LedgerError::InsufficientStock` - Quantity above the listing's stock
    /// * `LedgerError::InsufficientBalance` - Buyer cannot pay
    pub async fn purchase(
        &self,
        buyer_id: i64,
        listing_id: i64,
        quantity: i32,
    ) -> LedgerResult<PurchaseReceipt> {
        self.settle(buyer_id, vec![CheckoutItem::new(listing_id, quantity)], None)
            .await
    }

    /// Buy one unit of each listing, all or nothing
    ///
    /// # Errors
    ///
    /// * `LedgerError::EmptyCart` - No listing ids
    /// * `LedgerError::ListingUnavailable` - A listing is missing, not ACTIVE or repeated
    ///
    /// Plus the errors of [`SettlementManager::purchase`].
    pub async fn purchase_batch(
        &self,
        buyer_id: i64,
        listing_ids: &[i64],
    ) -> LedgerResult<PurchaseReceipt> {
        let cart = listing_ids
            .iter()
            .map(|&id| CheckoutItem::new(id, 1))
            .collect();
        self.settle(buyer_id, cart, None).await
    }

    /// Settle a cart into a PAID order shipped to one of the buyer's addresses
    ///
    /// # Errors
    ///
    /// * `LedgerError::AddressNotFound` - Address missing or owned by another user
    ///
    /// Plus the errors of [`SettlementManager::purchase_batch`].
    pub async fn checkout(
        &self,
        buyer_id: i64,
        address_id: i64,
        items: &[CheckoutItem],
    ) -> LedgerResult<PurchaseReceipt> {
        self.settle(buyer_id, items.to_vec(), Some(address_id))
            .await
    }

    /// Get one of the buyer's orders with its items
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - No such order for this buyer
    pub async fn get_order(&self, buyer_id: i64, order_id: Uuid) -> LedgerResult<Order> {
        let sql = format!(
            "SELECT {} FROM orders WHERE id = $1 AND buyer_id = $2",
            Order::COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(order_id)
            .bind(buyer_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::NotFound(Resource::Order(order_id)))?;

        let mut order = Order::from_row(&row)?;
        order.items = self
            .items_by_order(&[order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default();

        Ok(order)
    }

    /// The buyer's orders, newest first, with their items
    pub async fn list_orders(&self, buyer_id: i64) -> LedgerResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC",
            Order::COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(buyer_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        let mut orders = rows
            .iter()
            .map(Order::from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
        let mut items = self.items_by_order(&ids).await?;
        for order in &mut orders {
            order.items = items.remove(&order.id).unwrap_or_default();
        }

        Ok(orders)
    }

    /// Order items sold by `seller_id`, newest order first
    ///
    /// # Arguments
    ///
    /// * `status` - Only items in this fulfilment status
    pub async fn list_sales(
        &self,
        seller_id: i64,
        status: Option<OrderItemStatus>,
    ) -> LedgerResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {items}, o.buyer_id, u.username AS buyer_username, o.created_at AS ordered_at,
                    o.shipping_name, o.shipping_cep, o.shipping_street, o.shipping_number,
                    o.shipping_complement, o.shipping_neighborhood, o.shipping_city,
                    o.shipping_state
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             JOIN users u ON u.id = o.buyer_id
             WHERE oi.seller_id = $1 AND ($2::text IS NULL OR oi.status = $2)
             ORDER BY o.created_at DESC, oi.id",
            items = qualified_item_columns()
        );
        let rows = sqlx::query(&sql)
            .bind(seller_id)
            .bind(status.map(OrderItemStatus::as_str))
            .fetch_all(self.pool.as_ref())
            .await?;

        let sales = rows
            .iter()
            .map(|row| {
                Ok(Sale {
                    item: OrderItem::from_row(row)?,
                    buyer_id: row.try_get("buyer_id")?,
                    buyer_username: row.try_get("buyer_username")?,
                    ordered_at: row.try_get("ordered_at")?,
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
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(sales)
    }

    /// Run one settlement; `address_id` turns it into a checkout with an order
    async fn settle(
        &self,
        buyer_id: i64,
        cart: Vec<CheckoutItem>,
        address_id: Option<i64>,
    ) -> LedgerResult<PurchaseReceipt> {
        validate_cart_shape(&cart)?;

        bounded(self.config.transaction_timeout, async {
            let mut tx = begin_atomic(&self.pool, self.config.lock_timeout).await?;

            let shipping = match address_id {
                Some(id) => Some(load_address(&mut tx, buyer_id, id).await?),
                None => None,
            };

            let listing_ids: Vec<i64> = cart.iter().map(|item| item.listing_id).collect();
            let listings = lock_listings(&mut tx, &listing_ids).await?;

            let mut parties: Vec<i64> = listings.values().map(|l| l.seller_id).collect();
            parties.push(buyer_id);
            let wallets = ledger::lock_wallets_for_users(&mut tx, &parties).await?;
            let buyer_wallet = wallets
                .get(&buyer_id)
                .ok_or(LedgerError::NotFound(Resource::Wallet(buyer_id)))?;

            let plan = SettlementPlan::build(buyer_wallet, &cart, &listings)?;

            let order_id = match shipping {
                Some(shipping) => Some(insert_order(&mut tx, &plan, shipping).await?),
                None => None,
            };

            let audit = AuditInfo::default();
            let mut new_balance = buyer_wallet.balance;
            for item in &plan.items {
                let seller_wallet = wallets
                    .get(&item.listing.seller_id)
                    .ok_or(LedgerError::NotFound(Resource::Wallet(item.listing.seller_id)))?;

                new_balance = ledger::debit_balance(&mut tx, buyer_wallet.id, item.total).await?;
                ledger::credit_balance(&mut tx, seller_wallet.id, item.total).await?;

                let suffix = order_id
                    .map(|id| format!(" (Order #{})", short_order_id(id)))
                    .unwrap_or_default();
                for (wallet_id, transaction_type, label) in [
                    (buyer_wallet.id, TransactionType::Purchase, "Purchase"),
                    (seller_wallet.id, TransactionType::Sale, "Sale"),
                ] {
                    ledger::insert_transaction(
                        &mut tx,
                        NewTransaction {
                            related_listing_id: Some(item.listing.id),
                            ..NewTransaction::completed(
                                wallet_id,
                                transaction_type,
                                item.total,
                                format!("{label}: {}{suffix}", item.listing.card_name),
                                &audit,
                            )
                        },
                    )
                    .await?;
                }

                update_listing_stock(&mut tx, item, buyer_id).await?;
            }

            tx.commit().await?;

            log::info!(
                "User {} settled {} item(s) for {}{}",
                buyer_id,
                plan.items.len(),
                plan.total,
                order_id
                    .map(|id| format!(" in order {id}"))
                    .unwrap_or_default()
            );

            Ok(PurchaseReceipt {
                new_balance,
                total_paid: plan.total,
                cards: plan.card_names(),
                order_id,
            })
        })
        .await
    }

    async fn items_by_order(&self, order_ids: &[Uuid]) -> LedgerResult<HashMap<Uuid, Vec<OrderItem>>> {
        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }

        let sql = format!(
            "SELECT {} FROM order_items WHERE order_id = ANY($1) ORDER BY id",
            OrderItem::COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(order_ids)
            .fetch_all(self.pool.as_ref())
            .await?;

        for row in &rows {
            let item = OrderItem::from_row(row)?;
            grouped.entry(item.order_id).or_default().push(item);
        }

        Ok(grouped)
    }
}

fn qualified_item_columns() -> String {
    OrderItem::COLUMNS
        .split(", ")
        .map(|column| format!("oi.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn load_address(
    conn: &mut PgConnection,
    buyer_id: i64,
    address_id: i64,
) -> LedgerResult<ShippingSnapshot> {
    let sql = format!(
        "SELECT {} FROM user_addresses WHERE id = $1 AND user_id = $2",
        Address::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(address_id)
        .bind(buyer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::AddressNotFound(address_id))?;

    Ok(Address::from_row(&row)?.into())
}

/// Lock listing rows in ascending id order
///
/// Missing ids are simply absent from the result; the plan reports them.
async fn lock_listings(
    conn: &mut PgConnection,
    listing_ids: &[i64],
) -> LedgerResult<HashMap<i64, CardListing>> {
    let mut ids = listing_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let sql = format!(
        "SELECT {} FROM card_listings WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        CardListing::COLUMNS
    );
    let rows = sqlx::query(&sql).bind(&ids).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| {
            let listing = CardListing::from_row(row)?;
            Ok((listing.id, listing))
        })
        .collect::<Result<HashMap<_, _>, sqlx::Error>>()
        .map_err(LedgerError::from)
}

async fn insert_order(
    conn: &mut PgConnection,
    plan: &SettlementPlan,
    shipping: ShippingSnapshot,
) -> LedgerResult<Uuid> {
    let order_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO orders (id, buyer_id, shipping_name, shipping_cep, shipping_street,
             shipping_number, shipping_complement, shipping_neighborhood, shipping_city,
             shipping_state, total, status, paid_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())",
    )
    .bind(order_id)
    .bind(plan.buyer_id)
    .bind(&shipping.name)
    .bind(&shipping.cep)
    .bind(&shipping.street)
    .bind(&shipping.number)
    .bind(&shipping.complement)
    .bind(&shipping.neighborhood)
    .bind(&shipping.city)
    .bind(&shipping.state)
    .bind(plan.total)
    .bind(OrderStatus::Paid.as_str())
    .execute(&mut *conn)
    .await?;

    for item in &plan.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, listing_id, seller_id, card_id, card_name,
                 card_image, condition, quantity, unit_price, total_price, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order_id)
        .bind(item.listing.id)
        .bind(item.listing.seller_id)
        .bind(&item.listing.card_id)
        .bind(&item.listing.card_name)
        .bind(&item.listing.card_image)
        .bind(&item.listing.condition)
        .bind(item.quantity)
        .bind(item.listing.price)
        .bind(item.total)
        .bind(OrderItemStatus::Pending.as_str())
        .execute(&mut *conn)
        .await?;
    }

    Ok(order_id)
}

async fn update_listing_stock(
    conn: &mut PgConnection,
    item: &PlannedItem,
    buyer_id: i64,
) -> LedgerResult<()> {
    if item.sells_out() {
        sqlx::query(
            "UPDATE card_listings
             SET quantity = 0, status = 'SOLD', buyer_id = $1, sold_at = NOW(), updated_at = NOW()
             WHERE id = $2",
        )
        .bind(buyer_id)
        .bind(item.listing.id)
        .execute(&mut *conn)
        .await?;
    } else {
        sqlx::query(
            "UPDATE card_listings SET quantity = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(item.remaining_stock())
        .bind(item.listing.id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

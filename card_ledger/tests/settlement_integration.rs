//! Integration tests for purchase, batch purchase and checkout settlement.
//!
//! Requires a PostgreSQL database at `DATABASE_URL`.

mod common;

use card_ledger::LedgerError;
use card_ledger::market::{CheckoutItem, OrderItemStatus, OrderStatus};
use card_ledger::wallet::{DESCRIPTION_MAX_CHARS, TransactionType};
use common::{create_address, create_listing, listing_state, setup_ledger, transaction_count};
use rust_decimal_macros::dec;
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_purchase_moves_funds_and_stock() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_sell", dec!(0)).await;
    let buyer = ledger.funded_user("mk_buy", dec!(100.00)).await;
    let listing = create_listing(&ledger.pool, seller, "Charizard", dec!(12.50), 3).await;

    let receipt = ledger
        .market
        .purchase(buyer, listing, 2)
        .await
        .expect("Purchase should succeed");
    assert_eq!(receipt.total_paid, dec!(25.00));
    assert_eq!(receipt.new_balance, dec!(75.00));
    assert_eq!(receipt.cards, vec!["Charizard".to_string()]);
    assert!(receipt.order_id.is_none());

    assert_eq!(ledger.balance(buyer).await, dec!(75.00));
    assert_eq!(ledger.balance(seller).await, dec!(25.00));
    assert_eq!(listing_state(&ledger.pool, listing).await, ("ACTIVE".to_string(), 1));

    let buyer_log = ledger.wallets.get_transactions(buyer, 1).await.unwrap();
    assert_eq!(buyer_log[0].transaction_type, TransactionType::Purchase);
    assert_eq!(buyer_log[0].description, "Purchase: Charizard");
    assert_eq!(buyer_log[0].related_listing_id, Some(listing));

    let seller_log = ledger.wallets.get_transactions(seller, 1).await.unwrap();
    assert_eq!(seller_log[0].transaction_type, TransactionType::Sale);
    assert_eq!(seller_log[0].amount, dec!(25.00));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_last_unit_marks_listing_sold() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_last_s", dec!(0)).await;
    let buyer = ledger.funded_user("mk_last_b", dec!(50.00)).await;
    let listing = create_listing(&ledger.pool, seller, "Pikachu", dec!(5.00), 1).await;

    ledger.market.purchase(buyer, listing, 1).await.unwrap();
    assert_eq!(listing_state(&ledger.pool, listing).await, ("SOLD".to_string(), 0));

    let again = ledger.market.purchase(buyer, listing, 1).await;
    assert!(matches!(again, Err(LedgerError::ListingUnavailable(id)) if id == listing));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_long_card_name_can_be_bought() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_long_s", dec!(0)).await;
    let buyer = ledger.funded_user("mk_long_b", dec!(20.00)).await;
    let name = "N".repeat(250);
    let listing = create_listing(&ledger.pool, seller, &name, dec!(5.00), 1).await;

    let receipt = ledger
        .market
        .purchase(buyer, listing, 1)
        .await
        .expect("Card name length must not block a sale");
    assert_eq!(receipt.cards, vec![name]);
    assert_eq!(ledger.balance(seller).await, dec!(5.00));

    let buyer_log = ledger.wallets.get_transactions(buyer, 1).await.unwrap();
    assert!(buyer_log[0].description.starts_with("Purchase: NNN"));
    assert_eq!(buyer_log[0].description.chars().count(), DESCRIPTION_MAX_CHARS);
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_self_purchase_rejected() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_self", dec!(100.00)).await;
    let listing = create_listing(&ledger.pool, seller, "Mewtwo", dec!(10.00), 1).await;

    let result = ledger.market.purchase(seller, listing, 1).await;
    assert!(matches!(result, Err(LedgerError::SelfPurchase { .. })));
    assert_eq!(ledger.balance(seller).await, dec!(100.00));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_insufficient_stock_and_balance() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_lim_s", dec!(0)).await;
    let buyer = ledger.funded_user("mk_lim_b", dec!(10.00)).await;
    let listing = create_listing(&ledger.pool, seller, "Eevee", dec!(4.00), 2).await;

    let stock = ledger.market.purchase(buyer, listing, 3).await;
    assert!(matches!(
        stock,
        Err(LedgerError::InsufficientStock { available: 2, requested: 3, .. })
    ));

    let listing_b = create_listing(&ledger.pool, seller, "Snorlax", dec!(10.01), 1).await;
    let funds = ledger.market.purchase(buyer, listing_b, 1).await;
    assert!(matches!(
        funds,
        Err(LedgerError::InsufficientBalance { .. })
    ));

    let zero = ledger.market.purchase(buyer, listing, 0).await;
    assert!(matches!(zero, Err(LedgerError::InvalidQuantity(0))));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_batch_is_all_or_nothing() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_batch_s", dec!(0)).await;
    let buyer = ledger.funded_user("mk_batch_b", dec!(100.00)).await;
    let first = create_listing(&ledger.pool, seller, "Bulbasaur", dec!(10.00), 1).await;
    let second = create_listing(&ledger.pool, seller, "Squirtle", dec!(10.00), 1).await;
    let buyer_entries = transaction_count(&ledger.pool, buyer).await;

    // Second listing sold elsewhere first
    sqlx::query("UPDATE card_listings SET status = 'SOLD', quantity = 0 WHERE id = $1")
        .bind(second)
        .execute(ledger.pool.as_ref())
        .await
        .unwrap();

    let result = ledger.market.purchase_batch(buyer, &[first, second]).await;
    assert!(matches!(result, Err(LedgerError::ListingUnavailable(id)) if id == second));

    assert_eq!(ledger.balance(buyer).await, dec!(100.00));
    assert_eq!(ledger.balance(seller).await, dec!(0));
    assert_eq!(listing_state(&ledger.pool, first).await, ("ACTIVE".to_string(), 1));
    assert_eq!(transaction_count(&ledger.pool, buyer).await, buyer_entries);
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_batch_pays_each_seller() {
    let ledger = setup_ledger().await;
    let seller_a = ledger.funded_user("mk_pay_a", dec!(0)).await;
    let seller_b = ledger.funded_user("mk_pay_b", dec!(0)).await;
    let buyer = ledger.funded_user("mk_pay_buy", dec!(100.00)).await;
    let first = create_listing(&ledger.pool, seller_a, "Gengar", dec!(7.25), 1).await;
    let second = create_listing(&ledger.pool, seller_b, "Gyarados", dec!(12.75), 1).await;

    let receipt = ledger
        .market
        .purchase_batch(buyer, &[second, first])
        .await
        .unwrap();
    assert_eq!(receipt.total_paid, dec!(20.00));
    assert_eq!(receipt.cards, vec!["Gyarados".to_string(), "Gengar".to_string()]);

    assert_eq!(ledger.balance(buyer).await, dec!(80.00));
    assert_eq!(ledger.balance(seller_a).await, dec!(7.25));
    assert_eq!(ledger.balance(seller_b).await, dec!(12.75));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_duplicate_listing_in_batch_rejected() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_dup_s", dec!(0)).await;
    let buyer = ledger.funded_user("mk_dup_b", dec!(100.00)).await;
    let listing = create_listing(&ledger.pool, seller, "Jigglypuff", dec!(3.00), 5).await;

    let result = ledger.market.purchase_batch(buyer, &[listing, listing]).await;
    assert!(matches!(result, Err(LedgerError::ListingUnavailable(_))));
    assert_eq!(ledger.balance(buyer).await, dec!(100.00));

    let empty = ledger.market.purchase_batch(buyer, &[]).await;
    assert!(matches!(empty, Err(LedgerError::EmptyCart)));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_checkout_creates_paid_order() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_co_s", dec!(0)).await;
    let buyer = ledger.funded_user("mk_co_b", dec!(100.00)).await;
    let address = create_address(&ledger.pool, buyer).await;
    let first = create_listing(&ledger.pool, seller, "Lapras", dec!(8.00), 4).await;
    let second = create_listing(&ledger.pool, seller, "Dragonite", dec!(30.00), 1).await;

    let receipt = ledger
        .market
        .checkout(
            buyer,
            address,
            &[CheckoutItem::new(first, 2), CheckoutItem::new(second, 1)],
        )
        .await
        .unwrap();
    assert_eq!(receipt.total_paid, dec!(46.00));
    let order_id = receipt.order_id.expect("Checkout creates an order");

    let order = ledger.market.get_order(buyer, order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.paid_at.is_some());
    assert_eq!(order.total, dec!(46.00));
    assert_eq!(order.shipping.city, "Sao Paulo");
    assert_eq!(order.items.len(), 2);
    assert!(order.items.iter().all(|item| item.status == OrderItemStatus::Pending));

    let buyer_log = ledger.wallets.get_transactions(buyer, 1).await.unwrap();
    assert!(buyer_log[0]
        .description
        .ends_with(&format!("(Order #{})", order.short_id())));

    let sales = ledger.market.list_sales(seller, None).await.unwrap();
    assert_eq!(sales.len(), 2);
    assert!(sales.iter().all(|sale| sale.buyer_id == buyer));

    // Orders are private to their buyer
    let foreign = ledger.market.get_order(seller, order_id).await;
    assert!(matches!(foreign, Err(LedgerError::NotFound(_))));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_checkout_with_foreign_address_rejected() {
    let ledger = setup_ledger().await;
    let seller = ledger.funded_user("mk_addr_s", dec!(0)).await;
    let buyer = ledger.funded_user("mk_addr_b", dec!(100.00)).await;
    let sellers_address = create_address(&ledger.pool, seller).await;
    let listing = create_listing(&ledger.pool, seller, "Vaporeon", dec!(9.00), 1).await;

    let result = ledger
        .market
        .checkout(buyer, sellers_address, &[CheckoutItem::new(listing, 1)])
        .await;
    assert!(matches!(result, Err(LedgerError::AddressNotFound(_))));
    assert!(ledger.market.list_orders(buyer).await.unwrap().is_empty());
    assert_eq!(listing_state(&ledger.pool, listing).await, ("ACTIVE".to_string(), 1));
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn test_concurrent_buyers_cannot_oversell() {
    let ledger = Arc::new(setup_ledger().await);
    let seller = ledger.funded_user("mk_race_s", dec!(0)).await;
    let listing = create_listing(&ledger.pool, seller, "Mew", dec!(20.00), 1).await;

    let mut buyers = Vec::new();
    for _ in 0..4 {
        buyers.push(ledger.funded_user("mk_race_b", dec!(50.00)).await);
    }

    let mut handles = Vec::new();
    for buyer in buyers.clone() {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.market.purchase(buyer, listing, 1).await
        }));
    }

    let mut sold = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            sold += 1;
        }
    }
    assert_eq!(sold, 1);
    assert_eq!(ledger.balance(seller).await, dec!(20.00));

    let mut total = dec!(0);
    for buyer in buyers {
        total += ledger.balance(buyer).await;
    }
    assert_eq!(total, dec!(180.00));
}

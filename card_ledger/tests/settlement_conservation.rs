//! Conservation properties of settlement plans.
//!
//! Whatever the cart looks like, the buyer's debit must equal the sum of the
//! seller credits, no token may be created or lost to rounding, and a plan
//! never exists for a buyer who cannot pay.

use card_ledger::LedgerError;
use card_ledger::market::{CardListing, CheckoutItem, ListingStatus, SettlementPlan};
use card_ledger::wallet::Wallet;
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;

const BUYER_ID: i64 = 1;

fn wallet(balance: Decimal) -> Wallet {
    Wallet {
        id: 100,
        user_id: BUYER_ID,
        balance,
        pending_balance: Decimal::ZERO,
        total_deposited: balance,
        total_withdrawn: Decimal::ZERO,
        is_verified: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn listing(id: i64, seller_id: i64, cents: i64, quantity: i32) -> CardListing {
    CardListing {
        id,
        seller_id,
        buyer_id: None,
        card_id: format!("card-{id}"),
        card_name: format!("Card {id}"),
        card_image: String::new(),
        condition: "NEAR_MINT".to_string(),
        price: Decimal::new(cents, 2),
        quantity,
        status: ListingStatus::Active,
        sold_at: None,
    }
}

/// (seller, price in cents, stock, requested) per cart line
fn cart_strategy() -> impl Strategy<Value = Vec<(i64, i64, i32, i32)>> {
    prop::collection::vec((2i64..6, 1i64..50_000, 1i32..10, 1i32..10), 1..8)
}

fn build_inputs(
    lines: &[(i64, i64, i32, i32)],
) -> (Vec<CheckoutItem>, HashMap<i64, CardListing>) {
    let mut cart = Vec::new();
    let mut listings = HashMap::new();
    for (index, &(seller, cents, stock, requested)) in lines.iter().enumerate() {
        let id = index as i64 + 10;
        listings.insert(id, listing(id, seller, cents, stock));
        cart.push(CheckoutItem::new(id, requested));
    }
    (cart, listings)
}

proptest! {
    #[test]
    fn test_debit_equals_seller_credits(
        lines in cart_strategy(),
        balance_cents in 0i64..5_000_000,
    ) {
        let (cart, listings) = build_inputs(&lines);
        let buyer = wallet(Decimal::new(balance_cents, 2));

        match SettlementPlan::build(&buyer, &cart, &listings) {
            Ok(plan) => {
                let credited: Decimal = plan.credits_by_seller().values().copied().sum();
                prop_assert_eq!(credited, plan.total);

                let expected: Decimal = lines
                    .iter()
                    .map(|&(_, cents, _, requested)| Decimal::new(cents * i64::from(requested), 2))
                    .sum();
                prop_assert_eq!(plan.total, expected);

                prop_assert!(plan.total <= buyer.balance);
                prop_assert!(plan.items.iter().all(|item| item.remaining_stock() >= 0));
                prop_assert_eq!(plan.items.len(), cart.len());
            }
            Err(LedgerError::InsufficientStock { available, requested, .. }) => {
                prop_assert!(requested > available);
            }
            Err(LedgerError::InsufficientBalance { available, required }) => {
                prop_assert_eq!(available, buyer.balance);
                prop_assert!(required > available);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn test_exact_balance_is_enough(lines in cart_strategy()) {
        let (mut cart, listings) = build_inputs(&lines);
        for item in &mut cart {
            item.quantity = item.quantity.min(listings[&item.listing_id].quantity);
        }
        let total: Decimal = cart
            .iter()
            .map(|item| listings[&item.listing_id].price * Decimal::from(item.quantity))
            .sum();

        let plan = SettlementPlan::build(&wallet(total), &cart, &listings);
        prop_assert!(plan.is_ok());

        let one_cent_short = wallet(total - Decimal::new(1, 2));
        let short = SettlementPlan::build(&one_cent_short, &cart, &listings);
        let is_insufficient = matches!(short, Err(LedgerError::InsufficientBalance { .. }));
        prop_assert!(is_insufficient);
    }

    #[test]
    fn test_every_seller_is_credited(lines in cart_strategy()) {
        let (mut cart, listings) = build_inputs(&lines);
        for item in &mut cart {
            item.quantity = 1;
        }
        let plan = SettlementPlan::build(&wallet(Decimal::new(100_000_000, 2)), &cart, &listings)
            .expect("Affordable single units always plan");

        let credited: Vec<i64> = plan.credits_by_seller().keys().copied().collect();
        prop_assert_eq!(plan.seller_ids(), credited);
        prop_assert!(plan.credits_by_seller().values().all(|amount| *amount > Decimal::ZERO));
    }
}

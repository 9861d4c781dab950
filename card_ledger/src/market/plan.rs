//! Settlement planning.
//!
//! A [`SettlementPlan`] is built from the locked listing snapshots and the
//! locked buyer wallet before anything is written. Building it performs every
//! validation; executing it only moves money and stock.

use super::models::{CardListing, CheckoutItem, ListingStatus};
use crate::{
    errors::{LedgerError, LedgerResult},
    money::line_total,
    wallet::Wallet,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One validated cart line
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub listing: CardListing,
    pub quantity: i32,
    /// `listing.price * quantity`
    pub total: Decimal,
}

impl PlannedItem {
    /// Stock left on the listing once this line settles
    pub fn remaining_stock(&self) -> i32 {
        self.listing.quantity - self.quantity
    }

    /// Whether this line empties the listing
    pub fn sells_out(&self) -> bool {
        self.remaining_stock() <= 0
    }
}

/// Validated settlement, ready to execute
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    pub buyer_id: i64,
    /// Lines in cart order
    pub items: Vec<PlannedItem>,
    pub total: Decimal,
}

impl SettlementPlan {
    /// Validate a cart against locked state
    ///
    /// Checks run in passes over the whole cart so the reported error does not
    /// depend on item order within a pass: availability, then self-purchase,
    /// then stock, then the buyer's funds.
    ///
    /// # Arguments
    ///
    /// * `buyer` - Buyer wallet, read under its row lock
    /// * `cart` - Requested lines in input order
    /// * `listings` - Locked listing rows keyed by id; absent ids are unavailable
    ///
    /// # Errors
    ///
    /// * `LedgerError::EmptyCart` - No lines
    /// * `LedgerError::InvalidQuantity` - A line asks for fewer than one unit
    /// * `LedgerError::ListingUnavailable` - Listing missing, not ACTIVE, or repeated
    /// * `LedgerError::SelfPurchase` - Buyer sells one of the listings
    /// * `LedgerError::InsufficientStock` - A line exceeds the listing's quantity
    /// * `LedgerError::InsufficientBalance` - Buyer cannot cover the total
    pub fn build(
        buyer: &Wallet,
        cart: &[CheckoutItem],
        listings: &HashMap<i64, CardListing>,
    ) -> LedgerResult<Self> {
        validate_cart_shape(cart)?;

        let mut seen = HashSet::with_capacity(cart.len());
        let mut lines = Vec::with_capacity(cart.len());
        for item in cart {
            let listing = listings
                .get(&item.listing_id)
                .filter(|listing| listing.status == ListingStatus::Active)
                .ok_or(LedgerError::ListingUnavailable(item.listing_id))?;
            if !seen.insert(item.listing_id) {
                return Err(LedgerError::ListingUnavailable(item.listing_id));
            }
            lines.push((listing, item.quantity));
        }

        if let Some((listing, _)) = lines
            .iter()
            .find(|(listing, _)| listing.seller_id == buyer.user_id)
        {
            return Err(LedgerError::SelfPurchase {
                listing_id: listing.id,
                card_name: listing.card_name.clone(),
            });
        }

        if let Some((listing, requested)) = lines
            .iter()
            .find(|(listing, requested)| *requested > listing.quantity)
        {
            return Err(LedgerError::InsufficientStock {
                listing_id: listing.id,
                card_name: listing.card_name.clone(),
                available: listing.quantity,
                requested: *requested,
            });
        }

        let items: Vec<PlannedItem> = lines
            .into_iter()
            .map(|(listing, quantity)| PlannedItem {
                total: line_total(listing.price, quantity),
                listing: listing.clone(),
                quantity,
            })
            .collect();
        let total: Decimal = items.iter().map(|item| item.total).sum();

        if buyer.balance < total {
            return Err(LedgerError::InsufficientBalance {
                available: buyer.balance,
                required: total,
            });
        }

        Ok(Self {
            buyer_id: buyer.user_id,
            items,
            total,
        })
    }

    /// Sellers receiving money, ascending
    pub fn seller_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.items.iter().map(|item| item.listing.seller_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Total credited to each seller
    pub fn credits_by_seller(&self) -> BTreeMap<i64, Decimal> {
        let mut credits = BTreeMap::new();
        for item in &self.items {
            *credits.entry(item.listing.seller_id).or_insert(Decimal::ZERO) += item.total;
        }
        credits
    }

    /// Card names in settlement order
    pub fn card_names(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| item.listing.card_name.clone())
            .collect()
    }
}

/// Checks that need no locked state
///
/// Run before any row is locked so that malformed carts fail fast.
pub fn validate_cart_shape(cart: &[CheckoutItem]) -> LedgerResult<()> {
    if cart.is_empty() {
        return Err(LedgerError::EmptyCart);
    }
    if let Some(item) = cart.iter().find(|item| item.quantity < 1) {
        return Err(LedgerError::InvalidQuantity(item.quantity));
    }
    Ok(())
}

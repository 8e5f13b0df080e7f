//! Catalog/pricing boundary: per-item quotes and the pricing rules that turn
//! a quote plus a quantity into a booking amount.
//!
//! Kind-specific behavior (guide capacity caps, vehicle driver fees) is data
//! on the quote, not per-vertical code paths: one `Quote` shape covers all
//! five verticals.

use crate::error::CatalogError;
use crate::types::{Currency, ItemId, ItemKind, Money};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A pricing add-on applied on top of the per-unit subtotal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Surcharge {
    /// Fixed amount added once per booking (e.g. a driver fee)
    Flat {
        /// Human-readable label for receipts
        label: String,
        /// Amount added
        amount: Money,
    },
    /// Percentage of the subtotal (e.g. insurance at 5%)
    Percent {
        /// Human-readable label for receipts
        label: String,
        /// Whole-number percentage
        percent: u32,
    },
}

/// What the catalog knows about pricing and limits for one item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Vertical the item belongs to
    pub kind: ItemKind,
    /// Price per unit (per guest, per participant, per rental)
    pub unit_price: Money,
    /// Currency all amounts are tagged with
    pub currency: Currency,
    /// Most units a single booking may take (guide capacity, tour cap)
    pub max_quantity: u32,
    /// Add-ons applied on top of the per-unit subtotal
    pub surcharges: Vec<Surcharge>,
}

impl Quote {
    /// Creates a quote with no surcharges.
    #[must_use]
    pub const fn new(
        kind: ItemKind,
        unit_price: Money,
        currency: Currency,
        max_quantity: u32,
    ) -> Self {
        Self {
            kind,
            unit_price,
            currency,
            max_quantity,
            surcharges: Vec::new(),
        }
    }

    /// Adds a surcharge.
    #[must_use]
    pub fn with_surcharge(mut self, surcharge: Surcharge) -> Self {
        self.surcharges.push(surcharge);
        self
    }

    /// Total amount for `quantity` units: unit price × quantity, then flat
    /// surcharges added and percentage surcharges applied on the subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::PriceOverflow`] if any step overflows.
    pub fn price_for(&self, item_id: ItemId, quantity: u32) -> Result<Money, CatalogError> {
        let subtotal = self
            .unit_price
            .checked_multiply(quantity)
            .ok_or(CatalogError::PriceOverflow(item_id))?;
        let mut total = subtotal;
        for surcharge in &self.surcharges {
            let addition = match surcharge {
                Surcharge::Flat { amount, .. } => *amount,
                Surcharge::Percent { percent, .. } => subtotal
                    .checked_percent(*percent)
                    .ok_or(CatalogError::PriceOverflow(item_id))?,
            };
            total = total
                .checked_add(addition)
                .ok_or(CatalogError::PriceOverflow(item_id))?;
        }
        Ok(total)
    }
}

/// Read-side catalog the coordinator prices and validates against.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns the quote for an item.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownItem`] for unlisted items.
    async fn quote(&self, item_id: &ItemId) -> Result<Quote, CatalogError>;
}

/// In-memory catalog keyed by item id.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    quotes: Mutex<HashMap<ItemId, Quote>>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists (or re-lists) an item.
    pub fn list(&self, item_id: ItemId, quote: Quote) {
        self.quotes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item_id, quote);
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn quote(&self, item_id: &ItemId) -> Result<Quote, CatalogError> {
        self.quotes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(item_id)
            .cloned()
            .ok_or(CatalogError::UnknownItem(*item_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flat_and_percent_surcharges_stack() {
        // Vehicle at 80.00/day with a 25.00 driver fee and 5% insurance
        let quote = Quote::new(ItemKind::Vehicle, Money::from_cents(8_000), Currency::Usd, 1)
            .with_surcharge(Surcharge::Flat {
                label: "driver".to_string(),
                amount: Money::from_cents(2_500),
            })
            .with_surcharge(Surcharge::Percent {
                label: "insurance".to_string(),
                percent: 5,
            });
        let total = quote.price_for(ItemId::new(), 3).unwrap();
        // 240.00 + 25.00 + 12.00 (5% of 240.00)
        assert_eq!(total, Money::from_cents(27_700));
    }

    #[test]
    fn overflow_is_an_error_not_a_wrap() {
        let quote = Quote::new(
            ItemKind::Tour,
            Money::from_cents(u64::MAX / 2),
            Currency::Usd,
            10,
        );
        let err = quote.price_for(ItemId::new(), 3).unwrap_err();
        assert!(matches!(err, CatalogError::PriceOverflow(_)));
    }

    #[tokio::test]
    async fn unlisted_item_is_unknown() {
        let catalog = StaticCatalog::new();
        let err = catalog.quote(&ItemId::new()).await.unwrap_err();
        assert!(matches!(err, CatalogError::UnknownItem(_)));
    }

    proptest! {
        #[test]
        fn percent_surcharge_never_exceeds_double(
            unit_cents in 1u64..10_000_000,
            quantity in 1u32..100,
            percent in 0u32..=100,
        ) {
            let quote = Quote::new(
                ItemKind::Tour,
                Money::from_cents(unit_cents),
                Currency::Usd,
                100,
            )
            .with_surcharge(Surcharge::Percent {
                label: "service".to_string(),
                percent,
            });
            let subtotal = Money::from_cents(unit_cents).checked_multiply(quantity).unwrap();
            let total = quote.price_for(ItemId::new(), quantity).unwrap();
            prop_assert!(total >= subtotal);
            prop_assert!(total.cents() <= subtotal.cents() * 2);
        }

        #[test]
        fn pricing_is_linear_without_surcharges(
            unit_cents in 1u64..1_000_000,
            quantity in 1u32..50,
        ) {
            let quote = Quote::new(
                ItemKind::Hotel,
                Money::from_cents(unit_cents),
                Currency::Eur,
                50,
            );
            let total = quote.price_for(ItemId::new(), quantity).unwrap();
            prop_assert_eq!(total.cents(), unit_cents * u64::from(quantity));
        }
    }
}

//! Inventory ledger: atomic reserve / release / commit over per-item capacity.
//!
//! `capacity_reserved` is the one contended resource in the system, so every
//! mutation goes through this single guarded entry point. The
//! check-then-increment in [`MemoryLedger::reserve`] runs as one critical
//! section; callers never read-then-write availability themselves.
//!
//! Holds start out provisional with an expiry. Payment confirmation commits
//! them; an uncommitted hold past its expiry stops counting against capacity
//! and is physically collected by the sweep.

use crate::clock::{Clock, SystemClock};
use crate::error::LedgerError;
use crate::types::{BookingWindow, HoldId, ItemId, ItemKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A bookable unit of inventory with a total capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Catalog item identifier
    pub item_id: ItemId,
    /// Vertical this item belongs to
    pub kind: ItemKind,
    /// Total capacity per overlapping window
    pub capacity_total: u32,
}

impl InventoryItem {
    /// Creates an inventory record.
    #[must_use]
    pub const fn new(item_id: ItemId, kind: ItemKind, capacity_total: u32) -> Self {
        Self {
            item_id,
            kind,
            capacity_total,
        }
    }
}

/// Opaque handle to a hold, returned by `reserve` and consumed by
/// `release` / `commit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationToken {
    /// The hold this token refers to
    pub hold_id: HoldId,
    /// The item the hold is against
    pub item_id: ItemId,
}

/// Hold lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum HoldState {
    /// Counts against capacity until `expires_at`
    Provisional {
        /// When the hold lapses if not committed
        expires_at: DateTime<Utc>,
    },
    /// Permanent; counts against capacity until released
    Committed,
}

#[derive(Clone, Debug)]
struct Hold {
    hold_id: HoldId,
    window: Option<BookingWindow>,
    quantity: u32,
    state: HoldState,
}

impl Hold {
    fn counts_at(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            HoldState::Provisional { expires_at } => now < expires_at,
            HoldState::Committed => true,
        }
    }

    fn overlaps(&self, window: Option<&BookingWindow>) -> bool {
        match (self.window.as_ref(), window) {
            (Some(held), Some(requested)) => held.overlaps(requested),
            // Undated holds contend with everything on the item
            _ => true,
        }
    }
}

/// Atomic capacity accounting for bookable items.
///
/// Implementations must make `reserve` a single atomic conditional update:
/// under concurrent calls against the same item and overlapping window, the
/// sum of live holds never exceeds `capacity_total`.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Registers an item, replacing any prior record for the same id.
    ///
    /// # Errors
    ///
    /// Backend errors only.
    async fn register_item(&self, item: InventoryItem) -> Result<(), LedgerError>;

    /// Places a provisional hold of `quantity` against `item_id` for the
    /// given window, expiring at `expires_at` if never committed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownItem`] if the item was never registered
    /// - [`LedgerError::InvalidWindow`] if `start >= end`
    /// - [`LedgerError::CapacityExceeded`] if the quantity does not fit
    async fn reserve(
        &self,
        item_id: ItemId,
        window: Option<BookingWindow>,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<ReservationToken, LedgerError>;

    /// Releases a hold, returning its capacity to the pool. Releasing a hold
    /// that already lapsed or was released is a no-op, so compensation
    /// retries stay safe.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownItem`] if the item was never registered.
    async fn release(&self, token: &ReservationToken) -> Result<(), LedgerError>;

    /// Marks a provisional hold permanent after payment confirmation.
    /// Committing an already-committed hold is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::HoldNotFound`] if the hold lapsed or never
    /// existed; the reconciler maps this to a lapsed-hold verification
    /// failure.
    async fn commit(&self, token: &ReservationToken) -> Result<(), LedgerError>;

    /// Slots available for the given window right now.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownItem`] if the item was never registered.
    async fn availability(
        &self,
        item_id: &ItemId,
        window: Option<&BookingWindow>,
    ) -> Result<u32, LedgerError>;

    /// Collects every provisional hold that expired at or before `now`,
    /// removing them and returning their tokens so the sweeper can fail the
    /// corresponding bookings.
    ///
    /// # Errors
    ///
    /// Backend errors only; an empty sweep is `Ok(vec![])`.
    async fn sweep_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservationToken>, LedgerError>;
}

#[derive(Debug, Default)]
struct ItemCell {
    item: Option<InventoryItem>,
    holds: HashMap<HoldId, Hold>,
}

impl ItemCell {
    /// Live reserved quantity overlapping `window` as of `now`.
    fn reserved(&self, window: Option<&BookingWindow>, now: DateTime<Utc>) -> u32 {
        self.holds
            .values()
            .filter(|hold| hold.counts_at(now) && hold.overlaps(window))
            .map(|hold| hold.quantity)
            .sum()
    }
}

/// In-process ledger keeping all capacity records behind one mutex.
///
/// The lock is held only for the check-then-insert, never across awaits, so
/// the reserve path is a true critical section. A database-backed ledger
/// would express the same guard as a conditional update
/// (`... WHERE reserved + $q <= total`).
pub struct MemoryLedger {
    cells: Mutex<HashMap<ItemId, ItemCell>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Creates an empty ledger on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty ledger on the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ItemId, ItemCell>> {
        // A poisoned lock only means another thread panicked mid-read; the
        // map itself is still consistent because writers insert/remove whole
        // entries.
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InventoryLedger for MemoryLedger {
    async fn register_item(&self, item: InventoryItem) -> Result<(), LedgerError> {
        let mut cells = self.lock();
        let cell = cells.entry(item.item_id).or_default();
        cell.item = Some(item);
        Ok(())
    }

    async fn reserve(
        &self,
        item_id: ItemId,
        window: Option<BookingWindow>,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<ReservationToken, LedgerError> {
        let now = self.clock.now();
        let mut cells = self.lock();
        let cell = cells
            .get_mut(&item_id)
            .ok_or(LedgerError::UnknownItem(item_id))?;
        let Some(item) = cell.item.as_ref() else {
            return Err(LedgerError::UnknownItem(item_id));
        };

        let reserved = cell.reserved(window.as_ref(), now);
        let available = item.capacity_total.saturating_sub(reserved);
        if quantity > available {
            tracing::debug!(
                item_id = %item_id,
                requested = quantity,
                available,
                "reserve rejected: capacity exceeded"
            );
            return Err(LedgerError::CapacityExceeded {
                item_id,
                requested: quantity,
                available,
            });
        }

        let hold_id = HoldId::new();
        cell.holds.insert(
            hold_id,
            Hold {
                hold_id,
                window,
                quantity,
                state: HoldState::Provisional { expires_at },
            },
        );

        tracing::debug!(
            item_id = %item_id,
            hold_id = %hold_id,
            quantity,
            expires_at = %expires_at,
            "hold placed"
        );
        Ok(ReservationToken { hold_id, item_id })
    }

    async fn release(&self, token: &ReservationToken) -> Result<(), LedgerError> {
        let mut cells = self.lock();
        let cell = cells
            .get_mut(&token.item_id)
            .ok_or(LedgerError::UnknownItem(token.item_id))?;
        if cell.holds.remove(&token.hold_id).is_some() {
            tracing::debug!(item_id = %token.item_id, hold_id = %token.hold_id, "hold released");
        }
        Ok(())
    }

    async fn commit(&self, token: &ReservationToken) -> Result<(), LedgerError> {
        let now = self.clock.now();
        let mut cells = self.lock();
        let cell = cells
            .get_mut(&token.item_id)
            .ok_or(LedgerError::UnknownItem(token.item_id))?;
        let Some(hold) = cell.holds.get_mut(&token.hold_id) else {
            return Err(LedgerError::HoldNotFound(token.hold_id));
        };
        match hold.state {
            HoldState::Committed => Ok(()),
            HoldState::Provisional { expires_at } if now >= expires_at => {
                // Lapsed but not yet swept: treat the same as swept.
                cell.holds.remove(&token.hold_id);
                Err(LedgerError::HoldNotFound(token.hold_id))
            }
            HoldState::Provisional { .. } => {
                hold.state = HoldState::Committed;
                tracing::debug!(
                    item_id = %token.item_id,
                    hold_id = %token.hold_id,
                    "hold committed"
                );
                Ok(())
            }
        }
    }

    async fn availability(
        &self,
        item_id: &ItemId,
        window: Option<&BookingWindow>,
    ) -> Result<u32, LedgerError> {
        let now = self.clock.now();
        let cells = self.lock();
        let cell = cells
            .get(item_id)
            .ok_or(LedgerError::UnknownItem(*item_id))?;
        let Some(item) = cell.item.as_ref() else {
            return Err(LedgerError::UnknownItem(*item_id));
        };
        Ok(item
            .capacity_total
            .saturating_sub(cell.reserved(window, now)))
    }

    async fn sweep_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservationToken>, LedgerError> {
        let mut cells = self.lock();
        let mut expired = Vec::new();
        for (item_id, cell) in cells.iter_mut() {
            cell.holds.retain(|_, hold| match hold.state {
                HoldState::Provisional { expires_at } if now >= expires_at => {
                    expired.push(ReservationToken {
                        hold_id: hold.hold_id,
                        item_id: *item_id,
                    });
                    false
                }
                _ => true,
            });
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "swept expired holds");
        }
        Ok(expired)
    }
}

//! Periodic sweep of expired provisional holds.
//!
//! Expired holds stop counting against capacity the moment they lapse; the
//! sweep is garbage collection plus bookkeeping. Each collected hold's
//! booking is marked payment-failed so the owner sees a clear "hold lapsed,
//! pay again" state instead of a booking stuck on a ghost hold.

use crate::clock::Clock;
use crate::error::{LedgerError, StoreError};
use crate::ledger::InventoryLedger;
use crate::metrics;
use crate::store::BookingStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Collects expired holds and fails their bookings' payment state.
pub struct HoldSweeper {
    ledger: Arc<dyn InventoryLedger>,
    bookings: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl HoldSweeper {
    /// Creates a sweeper that runs every `interval` when spawned.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn InventoryLedger>,
        bookings: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            bookings,
            clock,
            interval,
        }
    }

    /// Runs one sweep pass, returning how many holds were collected.
    ///
    /// A booking whose hold was collected is marked payment-failed. When the
    /// update loses a version race, the booking moved on concurrently (paid
    /// or cancelled in the meantime) and is left alone.
    ///
    /// # Errors
    ///
    /// Ledger backend failures only; per-booking store failures are logged
    /// and skipped so one bad record never stalls the sweep.
    pub async fn sweep_once(&self) -> Result<usize, LedgerError> {
        let now = self.clock.now();
        let expired = self.ledger.sweep_expired(now).await?;
        let count = expired.len();

        for token in expired {
            match self.bookings.find_by_hold(&token.hold_id).await {
                Ok(Some(mut booking)) if booking.awaits_payment() => {
                    let booking_id = booking.id;
                    booking.fail_payment();
                    match self.bookings.update(booking).await {
                        Ok(_) => tracing::info!(
                            booking_id = %booking_id,
                            hold_id = %token.hold_id,
                            "hold expired before payment, booking marked retryable"
                        ),
                        Err(StoreError::VersionConflict { .. }) => tracing::debug!(
                            booking_id = %booking_id,
                            "booking moved on during sweep"
                        ),
                        Err(error) => tracing::warn!(
                            booking_id = %booking_id,
                            %error,
                            "could not record lapsed hold on booking"
                        ),
                    }
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(
                    hold_id = %token.hold_id,
                    %error,
                    "booking lookup failed during sweep"
                ),
            }
        }

        if count > 0 {
            metrics::record_holds_swept(u64::try_from(count).unwrap_or(u64::MAX));
        }
        Ok(count)
    }

    /// Spawns the sweep loop on the current runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = self.sweep_once().await {
                    tracing::error!(%error, "hold sweep failed");
                }
            }
        })
    }
}


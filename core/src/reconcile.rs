//! Payment reconciliation: turning gateway truth into booking state.
//!
//! A confirmation request (client callback or webhook) carries nothing but a
//! gateway reference. Opening a session records its reference on the booking;
//! a confirmation is accepted only if it presents that reference and the
//! charge the gateway reports for it matches the booking's amount and
//! currency, so one settled charge can never pay for a different booking.
//! On acceptance the inventory hold is committed before the booking is
//! marked paid, so a confirmed booking always sits on committed capacity.
//!
//! Re-delivery is expected: webhooks retry and users double-click. Confirming
//! an already-confirmed booking with the same reference is a no-op success;
//! any disagreement is a verification failure.

use crate::booking::{Booking, BookingStatus};
use crate::clock::Clock;
use crate::config::Config;
use crate::coordinator::hold_lifetime;
use crate::error::{LedgerError, ReconcileError, StoreError, VerifyFailure};
use crate::gateway::{ChargeStatus, GatewayConfirmation, PaymentGateway, PaymentSession};
use crate::ledger::{InventoryLedger, ReservationToken};
use crate::metrics;
use crate::notify::Notifier;
use crate::store::BookingStore;
use crate::types::{BookingId, Currency, Money};
use std::sync::Arc;

/// Applies gateway-verified payment outcomes to bookings.
pub struct PaymentReconciler {
    gateway: Arc<dyn PaymentGateway>,
    bookings: Arc<dyn BookingStore>,
    ledger: Arc<dyn InventoryLedger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl PaymentReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        bookings: Arc<dyn BookingStore>,
        ledger: Arc<dyn InventoryLedger>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            gateway,
            bookings,
            ledger,
            notifier,
            clock,
            config,
        }
    }

    /// Opens a gateway payment session for a booking awaiting payment and
    /// records its reference on the booking.
    ///
    /// If a previous charge failed or the hold lapsed, the booking no longer
    /// has a hold; a fresh one is placed first so the capacity guarantee
    /// holds for the retry as well.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::NotPayable`] if the booking is not awaiting payment
    /// - [`ReconcileError::InsufficientAvailability`] if capacity is gone on
    ///   a retry
    /// - [`ReconcileError::Gateway`] if the gateway rejects the session
    pub async fn open_session(&self, booking_id: BookingId) -> Result<PaymentSession, ReconcileError> {
        let mut booking = self.bookings.get(&booking_id).await?;
        if !booking.awaits_payment() {
            return Err(ReconcileError::NotPayable {
                booking_id,
                status: booking.status,
                payment_status: booking.payment_status,
            });
        }

        if booking.hold_id.is_none() {
            let expires_at = self.clock.now() + hold_lifetime(&self.config);
            let token = self
                .ledger
                .reserve(booking.item_id, booking.window, booking.quantity, expires_at)
                .await
                .map_err(|error| match error {
                    LedgerError::CapacityExceeded { available, .. } => {
                        metrics::record_capacity_conflict();
                        ReconcileError::InsufficientAvailability { available }
                    }
                    other => ReconcileError::Ledger(other),
                })?;
            booking.attach_hold(token.hold_id);
            booking = self.bookings.update(booking).await?;
            tracing::info!(
                booking_id = %booking_id,
                hold_id = %token.hold_id,
                "fresh hold placed for payment retry"
            );
        }

        let metadata = serde_json::json!({
            "booking_id": booking.id.to_string(),
            "item_id": booking.item_id.to_string(),
            "kind": booking.item_kind.to_string(),
            "requester": booking.requester.to_string(),
        });
        let session = self
            .gateway
            .create_session(booking.id, booking.amount, booking.currency, metadata)
            .await?;

        // Bind the session to the booking before any confirmation can race
        // in. Only the recorded reference is accepted as proof of payment;
        // reopening a session supersedes the previous one.
        booking.record_session(session.gateway_reference.clone());
        self.bookings.update(booking).await?;
        Ok(session)
    }

    /// Verifies a confirmation against the gateway and, if it checks out,
    /// commits the hold and marks the booking paid.
    ///
    /// Returns the confirmed booking. Confirming again with the same
    /// reference returns the booking unchanged.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::VerificationFailed`] when the charge cannot be
    ///   trusted; on amount/currency mismatch or a failed charge the hold is
    ///   released and the booking is retryable
    /// - [`ReconcileError::NotPayable`] for cancelled or delivered bookings
    /// - [`ReconcileError::Gateway`] on gateway transport failure; nothing
    ///   changed, safe to retry
    pub async fn confirm(
        &self,
        booking_id: BookingId,
        confirmation: &GatewayConfirmation,
    ) -> Result<Booking, ReconcileError> {
        let booking = self.bookings.get(&booking_id).await?;

        if booking.status == BookingStatus::Confirmed {
            if booking.payment_reference.as_deref() == Some(confirmation.reference.as_str()) {
                tracing::debug!(booking_id = %booking_id, "duplicate confirmation ignored");
                return Ok(booking);
            }
            return Err(self.reject(booking_id, VerifyFailure::ReferenceMismatch));
        }
        if !booking.awaits_payment() {
            return Err(ReconcileError::NotPayable {
                booking_id,
                status: booking.status,
                payment_status: booking.payment_status,
            });
        }
        // The reference must be the one recorded when this booking's session
        // was opened. A charge opened for another booking verifies fine on
        // its own but must never settle this one.
        if booking.payment_reference.as_deref() != Some(confirmation.reference.as_str()) {
            return Err(self.reject(booking_id, VerifyFailure::ReferenceMismatch));
        }

        let charge = self.gateway.verify(&confirmation.reference).await?;
        match charge.status {
            // Not settled yet: nothing changes, the caller may try again.
            ChargeStatus::Pending => Err(self.reject(booking_id, VerifyFailure::StillPending)),
            ChargeStatus::Failed { reason } => {
                self.record_failure(booking, true).await?;
                Err(self.reject(booking_id, VerifyFailure::ChargeFailed { reason }))
            }
            ChargeStatus::Succeeded => self.settle(booking, charge.amount, charge.currency, charge.reference).await,
        }
    }

    async fn settle(
        &self,
        booking: Booking,
        charged_amount: Money,
        charged_currency: Currency,
        reference: String,
    ) -> Result<Booking, ReconcileError> {
        let booking_id = booking.id;
        if charged_amount != booking.amount {
            let failure = VerifyFailure::AmountMismatch {
                expected: booking.amount,
                actual: charged_amount,
            };
            self.record_failure(booking, true).await?;
            return Err(self.reject(booking_id, failure));
        }
        if charged_currency != booking.currency {
            let failure = VerifyFailure::CurrencyMismatch {
                expected: booking.currency,
                actual: charged_currency,
            };
            self.record_failure(booking, true).await?;
            return Err(self.reject(booking_id, failure));
        }

        let Some(hold_id) = booking.hold_id else {
            // The sweep got here first; the charge settled against capacity
            // that is no longer held.
            self.record_failure(booking, false).await?;
            return Err(self.reject(booking_id, VerifyFailure::HoldLapsed));
        };
        let token = ReservationToken {
            hold_id,
            item_id: booking.item_id,
        };
        match self.ledger.commit(&token).await {
            Ok(()) => {}
            Err(LedgerError::HoldNotFound(_)) => {
                self.record_failure(booking, false).await?;
                return Err(self.reject(booking_id, VerifyFailure::HoldLapsed));
            }
            Err(other) => return Err(ReconcileError::Ledger(other)),
        }

        let mut confirmed = booking;
        confirmed.confirm_paid(reference.clone());
        match self.bookings.update(confirmed).await {
            Ok(updated) => {
                metrics::record_payment_confirmed();
                tracing::info!(
                    booking_id = %booking_id,
                    reference = %reference,
                    amount = updated.amount.cents(),
                    currency = %updated.currency,
                    "payment confirmed"
                );
                if let Err(error) = self.notifier.booking_confirmed(&updated).await {
                    tracing::warn!(booking_id = %booking_id, %error, "confirmation receipt not sent");
                }
                Ok(updated)
            }
            Err(conflict @ StoreError::VersionConflict { .. }) => {
                // A concurrent delivery of the same confirmation won the
                // write. Accept its result if it agrees; the notification
                // was already sent by the winner.
                let current = self.bookings.get(&booking_id).await?;
                if current.status == BookingStatus::Confirmed
                    && current.payment_reference.as_deref() == Some(reference.as_str())
                {
                    Ok(current)
                } else {
                    Err(ReconcileError::Storage(conflict))
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Marks the payment failed, releasing the hold when it is still ours to
    /// release. Tolerates a concurrent writer having moved the booking on.
    async fn record_failure(
        &self,
        booking: Booking,
        release_hold: bool,
    ) -> Result<(), ReconcileError> {
        if release_hold {
            if let Some(hold_id) = booking.hold_id {
                let token = ReservationToken {
                    hold_id,
                    item_id: booking.item_id,
                };
                if let Err(error) = self.ledger.release(&token).await {
                    tracing::warn!(
                        booking_id = %booking.id,
                        hold_id = %hold_id,
                        %error,
                        "could not release hold after failed charge"
                    );
                }
            }
        }
        let booking_id = booking.id;
        let mut failed = booking;
        failed.fail_payment();
        match self.bookings.update(failed).await {
            Ok(_) => Ok(()),
            Err(StoreError::VersionConflict { .. }) => {
                tracing::debug!(booking_id = %booking_id, "booking moved on while recording failure");
                Ok(())
            }
            Err(other) => Err(other.into()),
        }
    }

    fn reject(&self, booking_id: BookingId, failure: VerifyFailure) -> ReconcileError {
        metrics::record_verification_failed();
        tracing::warn!(booking_id = %booking_id, %failure, "payment verification failed");
        ReconcileError::VerificationFailed(failure)
    }
}


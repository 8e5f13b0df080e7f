//! Cancellation policy engine.
//!
//! Unpaid bookings cancel immediately: no money moved, so the hold is
//! released and the booking closed in one step. Paid bookings queue a
//! cancellation request for staff review, triaged by how close the booked
//! window is; capacity returns to the pool only when a reviewer approves.

use crate::booking::{Booking, CancellationPriority, CancellationRequest, PaymentStatus, RefundMethod};
use crate::clock::Clock;
use crate::error::{CancellationError, StoreError};
use crate::ledger::{InventoryLedger, ReservationToken};
use crate::notify::Notifier;
use crate::store::{BookingStore, CancellationStore};
use crate::types::{BookingId, CancellationRequestId, Money, ReviewerId};
use std::sync::Arc;

/// What a cancellation attempt resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum CancellationOutcome {
    /// The booking was unpaid and has been cancelled outright.
    Cancelled(Booking),
    /// The booking is paid; a request now awaits staff review.
    PendingReview(CancellationRequest),
}

/// A reviewer's verdict on a pending cancellation request.
#[derive(Clone, Debug, PartialEq)]
pub enum ReviewDecision {
    /// Cancel the booking and record refund instructions.
    Approve {
        /// Amount to refund
        refund_amount: Money,
        /// Channel to refund through
        refund_method: RefundMethod,
    },
    /// Leave the booking as it is.
    Reject,
}

/// Routes cancellation attempts between immediate cancellation and staff
/// review, and applies review verdicts.
pub struct CancellationEngine {
    bookings: Arc<dyn BookingStore>,
    requests: Arc<dyn CancellationStore>,
    ledger: Arc<dyn InventoryLedger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl CancellationEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        requests: Arc<dyn CancellationStore>,
        ledger: Arc<dyn InventoryLedger>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            requests,
            ledger,
            notifier,
            clock,
        }
    }

    /// Requests cancellation of a booking.
    ///
    /// # Errors
    ///
    /// - [`CancellationError::NotCancellable`] for completed or already
    ///   cancelled bookings
    /// - [`CancellationError::DuplicateRequest`] when a paid booking already
    ///   has an open request
    pub async fn request_cancellation(
        &self,
        booking_id: BookingId,
        reason: String,
    ) -> Result<CancellationOutcome, CancellationError> {
        let booking = self.bookings.get(&booking_id).await?;
        if booking.status.is_terminal() {
            return Err(CancellationError::NotCancellable {
                booking_id,
                status: booking.status,
            });
        }

        match booking.payment_status {
            PaymentStatus::Pending | PaymentStatus::Failed => {
                self.release_hold(&booking).await;
                let mut cancelled = booking;
                cancelled.cancel();
                let updated = self.bookings.update(cancelled).await?;
                if let Err(error) = self.notifier.booking_cancelled(&updated).await {
                    tracing::warn!(booking_id = %booking_id, %error, "cancellation notice not sent");
                }
                tracing::info!(booking_id = %booking_id, "unpaid booking cancelled");
                Ok(CancellationOutcome::Cancelled(updated))
            }
            PaymentStatus::Paid => {
                let now = self.clock.now();
                let priority = CancellationPriority::for_window(booking.window.as_ref(), now);
                let request = CancellationRequest::new(
                    CancellationRequestId::new(),
                    booking_id,
                    reason,
                    priority,
                    now,
                );
                // The store rejects the insert atomically if an open request
                // already exists, so two racing requests cannot both land.
                if let Err(error) = self.requests.insert(request.clone()).await {
                    return Err(match error {
                        StoreError::OpenRequestExists {
                            booking_id,
                            request_id,
                        } => CancellationError::DuplicateRequest {
                            booking_id,
                            request_id,
                        },
                        other => CancellationError::Storage(other),
                    });
                }
                tracing::info!(
                    booking_id = %booking_id,
                    request_id = %request.id,
                    priority = ?priority,
                    "cancellation request queued for review"
                );
                Ok(CancellationOutcome::PendingReview(request))
            }
            PaymentStatus::Refunded => Err(CancellationError::NotCancellable {
                booking_id,
                status: booking.status,
            }),
        }
    }

    /// Applies a reviewer's verdict to a pending request.
    ///
    /// Approval cancels the booking, records the refund instructions, and
    /// returns its capacity to the pool. Rejection leaves the booking alone.
    ///
    /// # Errors
    ///
    /// Returns [`CancellationError::AlreadyReviewed`] if the request was
    /// decided before.
    pub async fn review(
        &self,
        request_id: CancellationRequestId,
        decision: ReviewDecision,
        reviewer: ReviewerId,
        notes: Option<String>,
    ) -> Result<CancellationRequest, CancellationError> {
        let mut request = self.requests.get(&request_id).await?;
        if !request.is_open() {
            return Err(CancellationError::AlreadyReviewed(request_id));
        }

        match decision {
            ReviewDecision::Approve {
                refund_amount,
                refund_method,
            } => {
                let booking = self.bookings.get(&request.booking_id).await?;
                self.release_hold(&booking).await;
                let mut refunded = booking;
                refunded.approve_refund();
                let updated = self.bookings.update(refunded).await?;
                if let Err(error) = self.notifier.booking_cancelled(&updated).await {
                    tracing::warn!(booking_id = %updated.id, %error, "cancellation notice not sent");
                }
                request.approve(refund_amount, refund_method, reviewer, notes);
                tracing::info!(
                    request_id = %request_id,
                    booking_id = %request.booking_id,
                    refund = refund_amount.cents(),
                    method = ?refund_method,
                    "cancellation approved"
                );
            }
            ReviewDecision::Reject => {
                request.reject(reviewer, notes);
                tracing::info!(
                    request_id = %request_id,
                    booking_id = %request.booking_id,
                    "cancellation rejected"
                );
            }
        }
        Ok(self.requests.update(request).await?)
    }

    /// All requests awaiting review, urgent first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn review_queue(&self) -> Result<Vec<CancellationRequest>, CancellationError> {
        Ok(self.requests.list_pending().await?)
    }

    async fn release_hold(&self, booking: &Booking) {
        let Some(hold_id) = booking.hold_id else {
            return;
        };
        let token = ReservationToken {
            hold_id,
            item_id: booking.item_id,
        };
        if let Err(error) = self.ledger.release(&token).await {
            tracing::warn!(
                booking_id = %booking.id,
                hold_id = %hold_id,
                %error,
                "could not release hold during cancellation"
            );
        }
    }
}


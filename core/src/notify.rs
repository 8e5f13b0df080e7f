//! Notification boundary: confirmation and cancellation receipts.
//!
//! Dispatch is fire-and-forget. Callers log failures and move on; a dead
//! mail server never rolls back a paid booking.

use crate::booking::Booking;
use crate::error::NotifyError;
use async_trait::async_trait;

/// Receipt/notification dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatches a booking-confirmed receipt.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Dispatch`] on delivery failure; callers treat
    /// it as non-fatal.
    async fn booking_confirmed(&self, booking: &Booking) -> Result<(), NotifyError>;

    /// Dispatches a booking-cancelled notice.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Dispatch`] on delivery failure; callers treat
    /// it as non-fatal.
    async fn booking_cancelled(&self, booking: &Booking) -> Result<(), NotifyError>;
}

/// Notifier that only logs, for development and embedding without a mail
/// backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(&self, booking: &Booking) -> Result<(), NotifyError> {
        tracing::info!(
            booking_id = %booking.id,
            requester = %booking.requester,
            amount = booking.amount.cents(),
            currency = %booking.currency,
            "booking confirmed"
        );
        Ok(())
    }

    async fn booking_cancelled(&self, booking: &Booking) -> Result<(), NotifyError> {
        tracing::info!(
            booking_id = %booking.id,
            requester = %booking.requester,
            "booking cancelled"
        );
        Ok(())
    }
}

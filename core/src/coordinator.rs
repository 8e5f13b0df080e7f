//! Reservation coordinator: turns a booking request into a pending-payment
//! booking with a live inventory hold.
//!
//! The sequence is validate → reserve → price → persist. Validation rejects
//! before any state is touched; a persistence failure after a successful
//! reserve triggers a compensating release so no hold is ever orphaned.

use crate::booking::Booking;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{BookingError, LedgerError};
use crate::ledger::InventoryLedger;
use crate::metrics;
use crate::retry::retry_with_backoff;
use crate::store::BookingStore;
use crate::types::{BookingId, BookingWindow, ItemId, ItemKind, RequesterId};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// A booking request as it arrives from the caller, window bounds unparsed.
#[derive(Clone, Debug)]
pub struct BookingRequest {
    /// Catalog item to book
    pub item_id: ItemId,
    /// Vertical the caller believes the item belongs to
    pub kind: ItemKind,
    /// Who is booking
    pub requester: RequesterId,
    /// Participants / guests / units
    pub quantity: u32,
    /// Window start for dated kinds
    pub window_start: Option<DateTime<Utc>>,
    /// Window end for dated kinds
    pub window_end: Option<DateTime<Utc>>,
}

/// Orchestrates booking creation across catalog, ledger, and store.
pub struct ReservationCoordinator {
    ledger: Arc<dyn InventoryLedger>,
    bookings: Arc<dyn BookingStore>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl ReservationCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn InventoryLedger>,
        bookings: Arc<dyn BookingStore>,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            ledger,
            bookings,
            catalog,
            clock,
            config,
        }
    }

    /// Validates request shape and business constraints, returning the
    /// parsed window for dated kinds.
    fn validate(
        &self,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingWindow>, BookingError> {
        if request.quantity == 0 {
            return Err(BookingError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        if !request.kind.is_dated() {
            if request.window_start.is_some() || request.window_end.is_some() {
                return Err(BookingError::Validation(format!(
                    "{} bookings do not take a date window",
                    request.kind
                )));
            }
            return Ok(None);
        }

        let (Some(start), Some(end)) = (request.window_start, request.window_end) else {
            return Err(BookingError::Validation(format!(
                "{} bookings require a date window",
                request.kind
            )));
        };
        let window = BookingWindow::new(start, end).map_err(|error| match error {
            LedgerError::InvalidWindow { start, end } => BookingError::Validation(format!(
                "invalid window: start {start} is not before end {end}"
            )),
            other => BookingError::Ledger(other),
        })?;
        if window.start() <= now {
            return Err(BookingError::Validation(
                "window must start in the future".to_string(),
            ));
        }
        Ok(Some(window))
    }

    /// Creates a booking in `pending_payment` with a live hold.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] before any state is touched
    /// - [`BookingError::InsufficientAvailability`] when capacity is gone
    /// - [`BookingError::Storage`] when persistence fails; the hold has
    ///   already been released by then
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        let now = self.clock.now();
        let window = self.validate(&request, now)?;

        let quote = self.catalog.quote(&request.item_id).await?;
        if quote.kind != request.kind {
            return Err(BookingError::Validation(format!(
                "item {} is a {}, not a {}",
                request.item_id, quote.kind, request.kind
            )));
        }
        let max_quantity = quote.max_quantity.min(self.config.default_max_quantity);
        if request.quantity > max_quantity {
            return Err(BookingError::Validation(format!(
                "quantity {} exceeds the maximum of {max_quantity}",
                request.quantity
            )));
        }

        let amount = quote.price_for(request.item_id, request.quantity)?;

        let expires_at = now + hold_lifetime(&self.config);
        let token = self
            .ledger
            .reserve(request.item_id, window, request.quantity, expires_at)
            .await
            .map_err(|error| match error {
                LedgerError::CapacityExceeded { available, .. } => {
                    metrics::record_capacity_conflict();
                    BookingError::InsufficientAvailability { available }
                }
                LedgerError::InvalidWindow { start, end } => BookingError::Validation(format!(
                    "invalid window: start {start} is not before end {end}"
                )),
                other => BookingError::Ledger(other),
            })?;

        let booking = Booking::new(
            BookingId::new(),
            request.kind,
            request.item_id,
            request.requester,
            request.quantity,
            window,
            amount,
            quote.currency,
            token.hold_id,
            now,
        );
        let booking_id = booking.id;

        if let Err(error) = self.bookings.insert(booking.clone()).await {
            // The hold must not outlive this failure. Retry the release; an
            // un-released hold is user-visible unavailability.
            let policy = self.config.compensation_retry_policy();
            let release = retry_with_backoff(&policy, || {
                let ledger = Arc::clone(&self.ledger);
                let token = token;
                async move { ledger.release(&token).await }
            })
            .await;
            if let Err(release_error) = release {
                metrics::record_compensation_failure();
                tracing::error!(
                    booking_id = %booking_id,
                    item_id = %request.item_id,
                    hold_id = %token.hold_id,
                    %release_error,
                    "compensating release failed; hold is orphaned until the sweep"
                );
            }
            return Err(BookingError::Storage(error));
        }

        metrics::record_booking_created();
        tracing::info!(
            booking_id = %booking_id,
            item_id = %request.item_id,
            kind = %request.kind,
            quantity = request.quantity,
            amount = amount.cents(),
            currency = %quote.currency,
            expires_at = %expires_at,
            "booking created, awaiting payment"
        );
        Ok(booking)
    }

    /// Slots available for an item and optional window, for rendering
    /// "Only N slots available".
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for unknown items.
    pub async fn availability(
        &self,
        item_id: &ItemId,
        window: Option<&BookingWindow>,
    ) -> Result<u32, BookingError> {
        self.ledger
            .availability(item_id, window)
            .await
            .map_err(|error| match error {
                LedgerError::UnknownItem(id) => {
                    BookingError::Validation(format!("unknown item: {id}"))
                }
                other => BookingError::Ledger(other),
            })
    }
}

/// Hold lifetime from config as a chrono duration.
pub(crate) fn hold_lifetime(config: &Config) -> Duration {
    Duration::seconds(i64::try_from(config.hold_timeout_secs).unwrap_or(i64::MAX))
}

//! Error taxonomy for the reservation-payment core.
//!
//! Low-level errors (`LedgerError`, `StoreError`) are raised by the inventory
//! ledger and the record stores. Only the coordinator, the reconciler, and
//! the cancellation engine translate them into caller-facing errors
//! (`BookingError`, `ReconcileError`, `CancellationError`).

use crate::booking::{BookingStatus, PaymentStatus};
use crate::types::{BookingId, CancellationRequestId, Currency, HoldId, ItemId, Money};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the inventory ledger.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The requested quantity would push reserved capacity past the total.
    #[error("capacity exceeded for item {item_id}: requested {requested}, available {available}")]
    CapacityExceeded {
        /// Item whose capacity was exhausted
        item_id: ItemId,
        /// Quantity that was requested
        requested: u32,
        /// Quantity actually available for the window
        available: u32,
    },

    /// The window is empty or inverted (`start >= end`).
    #[error("invalid window: start {start} is not before end {end}")]
    InvalidWindow {
        /// Requested window start
        start: DateTime<Utc>,
        /// Requested window end
        end: DateTime<Utc>,
    },

    /// No inventory record exists for this item.
    #[error("unknown inventory item: {0}")]
    UnknownItem(ItemId),

    /// The hold has lapsed or never existed.
    #[error("hold not found: {0}")]
    HoldNotFound(HoldId),
}

/// A booking lifecycle transition attempted from the wrong status.
#[derive(Debug, Clone, Error)]
#[error("invalid transition from status {from:?}")]
pub struct InvalidTransition {
    /// Status the booking was in
    pub from: BookingStatus,
}

/// Errors raised by the booking and cancellation-request stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No booking with this id.
    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    /// No cancellation request with this id.
    #[error("cancellation request not found: {0}")]
    RequestNotFound(CancellationRequestId),

    /// Optimistic-concurrency conflict: the record changed since it was read.
    #[error("version conflict: expected version {expected}, found {actual}")]
    VersionConflict {
        /// Version the writer expected
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// A record with this id already exists.
    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    /// The booking already has an open cancellation request; at most one may
    /// be pending at a time.
    #[error("booking {booking_id} already has open cancellation request {request_id}")]
    OpenRequestExists {
        /// Booking in question
        booking_id: BookingId,
        /// The request already pending
        request_id: CancellationRequestId,
    },

    /// Backend failure (connection, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by the catalog/pricing provider.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// No catalog entry for this item.
    #[error("item not in catalog: {0}")]
    UnknownItem(ItemId),

    /// Pricing arithmetic overflowed.
    #[error("price computation overflowed for item {0}")]
    PriceOverflow(ItemId),
}

/// Errors raised by a payment gateway adapter.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway rejected the session or charge outright.
    #[error("gateway declined: {reason}")]
    Declined {
        /// Gateway-supplied decline reason
        reason: String,
    },

    /// The gateway has no record of this reference.
    #[error("unknown gateway reference: {0}")]
    UnknownReference(String),

    /// The gateway did not answer in time.
    #[error("gateway timeout")]
    Timeout,

    /// Transport or gateway-side failure.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the notification service.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// Dispatch failed; the caller logs and moves on.
    #[error("notification dispatch failed: {0}")]
    Dispatch(String),
}

/// Caller-facing errors from the reservation coordinator.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Request rejected before any state was touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Capacity exhausted; surfaced to the user as "Only N slots available".
    #[error("only {available} slots available")]
    InsufficientAvailability {
        /// Slots still available for the requested window
        available: u32,
    },

    /// Catalog lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Booking persistence failed (the inventory hold has been released).
    #[error("booking could not be stored: {0}")]
    Storage(#[from] StoreError),

    /// An internal ledger failure that is not a capacity or window problem.
    #[error("inventory ledger error: {0}")]
    Ledger(LedgerError),
}

/// Why a gateway confirmation was not accepted as proof of payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    /// Gateway charge amount disagrees with the booking amount.
    AmountMismatch {
        /// Amount recorded on the booking
        expected: Money,
        /// Amount the gateway charged
        actual: Money,
    },
    /// Gateway charge currency disagrees with the booking currency.
    CurrencyMismatch {
        /// Currency recorded on the booking
        expected: Currency,
        /// Currency the gateway charged in
        actual: Currency,
    },
    /// The reference does not belong to this booking.
    ReferenceMismatch,
    /// The gateway reports the charge as failed.
    ChargeFailed {
        /// Gateway-supplied failure reason
        reason: String,
    },
    /// The gateway has not settled the charge yet.
    StillPending,
    /// The inventory hold expired before confirmation arrived.
    HoldLapsed,
}

impl std::fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmountMismatch { expected, actual } => {
                write!(f, "amount mismatch: booking {expected}, gateway {actual}")
            }
            Self::CurrencyMismatch { expected, actual } => {
                write!(f, "currency mismatch: booking {expected}, gateway {actual}")
            }
            Self::ReferenceMismatch => write!(f, "reference does not match this booking"),
            Self::ChargeFailed { reason } => write!(f, "charge failed: {reason}"),
            Self::StillPending => write!(f, "charge not settled yet"),
            Self::HoldLapsed => write!(f, "inventory hold lapsed before confirmation"),
        }
    }
}

/// Caller-facing errors from the payment reconciliation handler.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The confirmation could not be trusted; the booking stays retryable.
    #[error("payment could not be confirmed: {0}")]
    VerificationFailed(VerifyFailure),

    /// The booking is not awaiting payment.
    #[error("booking {booking_id} is not awaiting payment (status {status:?}, payment {payment_status:?})")]
    NotPayable {
        /// Booking in question
        booking_id: BookingId,
        /// Its current status
        status: BookingStatus,
        /// Its current payment status
        payment_status: PaymentStatus,
    },

    /// Gateway transport failure; safe to retry the confirmation.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Capacity was gone when re-reserving for a payment retry.
    #[error("only {available} slots available")]
    InsufficientAvailability {
        /// Slots still available
        available: u32,
    },

    /// An internal ledger failure that is not a capacity problem.
    #[error("inventory ledger error: {0}")]
    Ledger(LedgerError),

    /// Store failure.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Caller-facing errors from the cancellation policy engine.
#[derive(Debug, Error)]
pub enum CancellationError {
    /// An open cancellation request already exists for this booking.
    #[error("booking {booking_id} already has an open cancellation request {request_id}")]
    DuplicateRequest {
        /// Booking in question
        booking_id: BookingId,
        /// The already-open request
        request_id: CancellationRequestId,
    },

    /// The booking is in a state that cannot be cancelled.
    #[error("booking {booking_id} cannot be cancelled from status {status:?}")]
    NotCancellable {
        /// Booking in question
        booking_id: BookingId,
        /// Its current status
        status: BookingStatus,
    },

    /// The request has already been approved or rejected.
    #[error("cancellation request {0} has already been reviewed")]
    AlreadyReviewed(CancellationRequestId),

    /// Store failure.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

//! Reservation and payment coordination for multi-vertical travel booking.
//!
//! The crate keeps one invariant above all others: confirmed bookings never
//! exceed inventory capacity, no matter how requests race. Everything is
//! arranged around that guarantee:
//!
//! - [`ledger`] holds per-item capacity and makes reserve an atomic
//!   check-then-increment; a reservation is a provisional hold with an expiry
//! - [`coordinator`] validates a request, prices it against the [`catalog`],
//!   places the hold, and persists the booking, compensating with a release
//!   if persistence fails
//! - [`reconcile`] verifies payment confirmations against the gateway's own
//!   record and commits the hold before marking the booking paid
//! - [`cancellation`] cancels unpaid bookings outright and routes paid ones
//!   through staff review with window-proximity triage
//! - [`sweep`] collects holds whose owners never paid, returning capacity
//!   to the pool
//!
//! Storage, catalog, gateway, and notification are trait seams
//! ([`store::BookingStore`], [`catalog::Catalog`],
//! [`gateway::PaymentGateway`], [`notify::Notifier`]) with in-memory
//! implementations for embedding and tests.

pub mod booking;
pub mod cancellation;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod sweep;
pub mod types;

pub use booking::{
    Booking, BookingStatus, CancellationPriority, CancellationRequest, CancellationStatus,
    PaymentStatus, RefundMethod,
};
pub use cancellation::{CancellationEngine, CancellationOutcome, ReviewDecision};
pub use catalog::{Catalog, Quote, StaticCatalog, Surcharge};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use coordinator::{BookingRequest, ReservationCoordinator};
pub use error::{
    BookingError, CancellationError, CatalogError, GatewayError, InvalidTransition, LedgerError,
    NotifyError, ReconcileError, StoreError, VerifyFailure,
};
pub use gateway::{
    ChargeStatus, GatewayCharge, GatewayConfirmation, MockGateway, PaymentGateway, PaymentSession,
};
pub use ledger::{InventoryItem, InventoryLedger, MemoryLedger, ReservationToken};
pub use notify::{LogNotifier, Notifier};
pub use reconcile::PaymentReconciler;
pub use retry::{RetryPolicy, retry_with_backoff};
pub use store::{
    BookingStore, CancellationStore, MemoryBookingStore, MemoryCancellationStore,
};
pub use sweep::HoldSweeper;
pub use types::{
    BookingId, BookingWindow, CancellationRequestId, Currency, HoldId, ItemId, ItemKind, Money,
    RequesterId, ReviewerId,
};

//! Test doubles for the reservation-payment core.
//!
//! A controllable clock, a scriptable payment gateway, a recording notifier,
//! and a store wrapper that fails on demand. All of them are deterministic so
//! time-dependent behavior (hold expiry, priority triage) can be tested
//! without sleeping.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tripledger_core::booking::Booking;
use tripledger_core::clock::Clock;
use tripledger_core::error::{GatewayError, NotifyError, StoreError};
use tripledger_core::gateway::{
    ChargeStatus, GatewayCharge, PaymentGateway, PaymentSession,
};
use tripledger_core::notify::Notifier;
use tripledger_core::store::BookingStore;
use tripledger_core::types::{BookingId, Currency, HoldId, Money, RequesterId};

/// Installs a fmt subscriber honoring `RUST_LOG` for test output.
///
/// Safe to call from every test; only the first call in a process installs
/// anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// The current frozen instant.
    #[must_use]
    pub fn now_value(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.now_value()
    }
}

/// Gateway whose charges can be scripted per test.
///
/// Sessions settle as [`ChargeStatus::Succeeded`] with matching amounts
/// unless told otherwise; individual charges can be replaced outright to
/// simulate tampered or mismatched confirmations.
#[derive(Debug)]
pub struct ScriptedGateway {
    charges: Mutex<std::collections::HashMap<String, GatewayCharge>>,
    session_status: Mutex<ChargeStatus>,
    session_counter: AtomicUsize,
}

impl ScriptedGateway {
    /// Creates a gateway whose sessions settle successfully.
    #[must_use]
    pub fn new() -> Self {
        Self {
            charges: Mutex::new(std::collections::HashMap::new()),
            session_status: Mutex::new(ChargeStatus::Succeeded),
            session_counter: AtomicUsize::new(0),
        }
    }

    /// Sets the settlement status charges get when a session is opened.
    pub fn settle_sessions_as(&self, status: ChargeStatus) {
        *self
            .session_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Inserts or replaces a charge record, keyed by its reference.
    pub fn script_charge(&self, charge: GatewayCharge) {
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(charge.reference.clone(), charge);
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_session(
        &self,
        booking_id: BookingId,
        amount: Money,
        currency: Currency,
        _metadata: serde_json::Value,
    ) -> Result<PaymentSession, GatewayError> {
        let n = self.session_counter.fetch_add(1, Ordering::SeqCst);
        let reference = format!("test_pi_{n}");
        let status = self
            .session_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.script_charge(GatewayCharge {
            reference: reference.clone(),
            status,
            amount,
            currency,
        });
        Ok(PaymentSession {
            session_id: format!("test_sess_{n}"),
            booking_id,
            gateway_reference: reference,
            expected_amount: amount,
            currency,
            created_at: Utc::now(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayCharge, GatewayError> {
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownReference(reference.to_string()))
    }
}

/// Notifier that records every dispatch instead of sending anything.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    confirmed: Mutex<Vec<BookingId>>,
    cancelled: Mutex<Vec<BookingId>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Creates a notifier that accepts every dispatch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent dispatch fail, to test that callers treat
    /// notification failure as non-fatal.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Bookings a confirmation receipt was dispatched for, in order.
    #[must_use]
    pub fn confirmed(&self) -> Vec<BookingId> {
        self.confirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bookings a cancellation notice was dispatched for, in order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<BookingId> {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn booking_confirmed(&self, booking: &Booking) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Dispatch("mail server down".to_string()));
        }
        self.confirmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(booking.id);
        Ok(())
    }

    async fn booking_cancelled(&self, booking: &Booking) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Dispatch("mail server down".to_string()));
        }
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(booking.id);
        Ok(())
    }
}

/// Booking-store wrapper whose inserts can be made to fail, for exercising
/// compensation paths.
pub struct FailingBookingStore {
    inner: Arc<dyn BookingStore>,
    fail_inserts: AtomicBool,
}

impl FailingBookingStore {
    /// Wraps a store; inserts succeed until [`Self::fail_inserts`] is set.
    #[must_use]
    pub fn new(inner: Arc<dyn BookingStore>) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent insert fail with a backend error.
    pub fn fail_inserts(&self, failing: bool) {
        self.fail_inserts.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for FailingBookingStore {
    async fn insert(&self, booking: Booking) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.insert(booking).await
    }

    async fn get(&self, id: &BookingId) -> Result<Booking, StoreError> {
        self.inner.get(id).await
    }

    async fn update(&self, booking: Booking) -> Result<Booking, StoreError> {
        self.inner.update(booking).await
    }

    async fn find_by_hold(&self, hold_id: &HoldId) -> Result<Option<Booking>, StoreError> {
        self.inner.find_by_hold(hold_id).await
    }

    async fn list_by_requester(
        &self,
        requester: &RequesterId,
        status: Option<tripledger_core::booking::BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_by_requester(requester, status).await
    }
}

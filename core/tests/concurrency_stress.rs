//! Concurrency stress tests for the capacity guarantee.
//!
//! Many tasks race for the same inventory; the sum of successful bookings
//! must never exceed capacity, and duplicate payment confirmations must
//! produce exactly one confirmed booking and one receipt.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tripledger_core::{
    Booking, BookingError, BookingId, BookingRequest, BookingStatus, Catalog, Config,
    GatewayConfirmation, InventoryItem, InventoryLedger, ItemId, ItemKind, MemoryBookingStore,
    MemoryLedger, Money, Notifier, PaymentGateway, PaymentReconciler, Quote, RequesterId,
    ReservationCoordinator, StaticCatalog, SystemClock,
};
use tripledger_core::{BookingStore, Currency};
use tripledger_testing::{RecordingNotifier, ScriptedGateway};

struct Harness {
    coordinator: Arc<ReservationCoordinator>,
    reconciler: Arc<PaymentReconciler>,
    ledger: Arc<MemoryLedger>,
    bookings: Arc<MemoryBookingStore>,
    notifier: Arc<RecordingNotifier>,
    item_id: ItemId,
}

async fn harness(kind: ItemKind, capacity: u32, unit_cents: u64) -> Harness {
    tripledger_testing::init_tracing();
    let ledger = Arc::new(MemoryLedger::new());
    let bookings = Arc::new(MemoryBookingStore::new());
    let catalog = Arc::new(StaticCatalog::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(SystemClock);
    let item_id = ItemId::new();
    ledger
        .register_item(InventoryItem::new(item_id, kind, capacity))
        .await
        .unwrap();
    catalog.list(
        item_id,
        Quote::new(kind, Money::from_cents(unit_cents), Currency::Usd, 10),
    );

    let coordinator = Arc::new(ReservationCoordinator::new(
        Arc::clone(&ledger) as Arc<dyn InventoryLedger>,
        Arc::clone(&bookings) as Arc<dyn BookingStore>,
        Arc::clone(&catalog) as Arc<dyn Catalog>,
        Arc::clone(&clock) as _,
        Config::default(),
    ));
    let reconciler = Arc::new(PaymentReconciler::new(
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        Arc::clone(&bookings) as Arc<dyn BookingStore>,
        Arc::clone(&ledger) as Arc<dyn InventoryLedger>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&clock) as _,
        Config::default(),
    ));
    Harness {
        coordinator,
        reconciler,
        ledger,
        bookings,
        notifier,
        item_id,
    }
}

fn request(item_id: ItemId, quantity: u32) -> BookingRequest {
    let now = Utc::now();
    BookingRequest {
        item_id,
        kind: ItemKind::Tour,
        requester: RequesterId::new(),
        quantity,
        window_start: Some(now + Duration::days(30)),
        window_end: Some(now + Duration::days(32)),
    }
}

#[tokio::test]
async fn last_slot_goes_to_exactly_one_of_many() {
    let harness = harness(ItemKind::Tour, 1, 5_000).await;

    let attempts: Vec<_> = (0..20)
        .map(|_| {
            let coordinator = Arc::clone(&harness.coordinator);
            let req = request(harness.item_id, 1);
            tokio::spawn(async move { coordinator.create_booking(req).await })
        })
        .collect();
    let results: Vec<Result<Booking, BookingError>> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(BookingError::InsufficientAvailability { .. })
        ));
    }
}

#[tokio::test]
async fn oversubscribed_capacity_never_exceeded() {
    let harness = harness(ItemKind::Tour, 10, 5_000).await;

    // 30 racers want 2 slots each; at most 5 can win
    let attempts: Vec<_> = (0..30)
        .map(|_| {
            let coordinator = Arc::clone(&harness.coordinator);
            let req = request(harness.item_id, 2);
            tokio::spawn(async move { coordinator.create_booking(req).await })
        })
        .collect();
    let results: Vec<Result<Booking, BookingError>> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let won: u32 = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|b| b.quantity)
        .sum();
    assert_eq!(won, 10);

    let window = results
        .iter()
        .find_map(|r| r.as_ref().ok())
        .and_then(|b| b.window);
    assert_eq!(
        harness
            .ledger
            .availability(&harness.item_id, window.as_ref())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn duplicate_confirmations_confirm_once() {
    let harness = harness(ItemKind::Tour, 2, 5_000).await;

    let booking = harness
        .coordinator
        .create_booking(request(harness.item_id, 2))
        .await
        .unwrap();
    let session = harness.reconciler.open_session(booking.id).await.unwrap();

    // The same webhook delivered eight times at once
    let deliveries: Vec<_> = (0..8)
        .map(|_| {
            let reconciler = Arc::clone(&harness.reconciler);
            let booking_id = booking.id;
            let confirmation = GatewayConfirmation {
                reference: session.gateway_reference.clone(),
            };
            tokio::spawn(async move { reconciler.confirm(booking_id, &confirmation).await })
        })
        .collect();
    let results = join_all(deliveries).await;

    let mut confirmed_ids: Vec<BookingId> = Vec::new();
    for joined in results {
        let confirmed = joined.unwrap().unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        confirmed_ids.push(confirmed.id);
    }
    assert!(confirmed_ids.iter().all(|id| *id == booking.id));

    // Exactly one receipt went out
    assert_eq!(harness.notifier.confirmed(), vec![booking.id]);

    let stored = harness.bookings.get(&booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(
        stored.payment_reference.as_deref(),
        Some(session.gateway_reference.as_str())
    );
}

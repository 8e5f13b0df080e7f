//! Expired-hold sweeping: lapsed holds are collected, committed ones kept.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tripledger_core::*;
use tripledger_testing::TestClock;

#[tokio::test]
async fn sweep_collects_lapsed_holds_and_fails_their_bookings() {
    let clock = Arc::new(TestClock::new(Utc::now()));
    let ledger = Arc::new(MemoryLedger::with_clock(
        Arc::clone(&clock) as Arc<dyn Clock>
    ));
    let bookings = Arc::new(MemoryBookingStore::new());
    let item_id = ItemId::new();
    ledger
        .register_item(InventoryItem::new(item_id, ItemKind::Vehicle, 1))
        .await
        .unwrap();

    let now = clock.now_value();
    let token = ledger
        .reserve(item_id, None, 1, now + ChronoDuration::minutes(15))
        .await
        .unwrap();
    let booking = Booking::new(
        BookingId::new(),
        ItemKind::Vehicle,
        item_id,
        RequesterId::new(),
        1,
        None,
        Money::from_cents(9_000),
        Currency::Usd,
        token.hold_id,
        now,
    );
    let booking_id = booking.id;
    bookings.insert(booking).await.unwrap();

    let sweeper = HoldSweeper::new(
        Arc::clone(&ledger) as Arc<dyn InventoryLedger>,
        Arc::clone(&bookings) as Arc<dyn BookingStore>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Duration::from_secs(60),
    );

    // Before the timeout nothing is collected
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);

    clock.advance(ChronoDuration::minutes(16));
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    let swept = bookings.get(&booking_id).await.unwrap();
    assert_eq!(swept.payment_status, PaymentStatus::Failed);
    assert!(swept.hold_id.is_none());
    assert!(swept.awaits_payment());
    assert_eq!(ledger.availability(&item_id, None).await.unwrap(), 1);

    // Nothing left for a second pass
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
}

#[tokio::test]
async fn committed_holds_are_never_swept() {
    let clock = Arc::new(TestClock::new(Utc::now()));
    let ledger = Arc::new(MemoryLedger::with_clock(
        Arc::clone(&clock) as Arc<dyn Clock>
    ));
    let bookings = Arc::new(MemoryBookingStore::new());
    let item_id = ItemId::new();
    ledger
        .register_item(InventoryItem::new(item_id, ItemKind::Vehicle, 1))
        .await
        .unwrap();
    let now = clock.now_value();
    let token = ledger
        .reserve(item_id, None, 1, now + ChronoDuration::minutes(15))
        .await
        .unwrap();
    ledger.commit(&token).await.unwrap();

    let sweeper = HoldSweeper::new(
        Arc::clone(&ledger) as Arc<dyn InventoryLedger>,
        Arc::clone(&bookings) as Arc<dyn BookingStore>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Duration::from_secs(60),
    );
    clock.advance(ChronoDuration::hours(2));
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    assert_eq!(ledger.availability(&item_id, None).await.unwrap(), 0);
}

//! Cancellation policy: immediate for unpaid bookings, staff review for paid.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use tripledger_core::booking::{BookingStatus, CancellationStatus};
use tripledger_core::ledger::{InventoryItem, MemoryLedger};
use tripledger_core::store::{MemoryBookingStore, MemoryCancellationStore};
use tripledger_core::types::{BookingWindow, Currency, ItemId, ItemKind, Money, RequesterId};
use tripledger_core::*;
use tripledger_testing::{RecordingNotifier, TestClock};

struct Fixture {
    engine: CancellationEngine,
    bookings: Arc<MemoryBookingStore>,
    ledger: Arc<MemoryLedger>,
    notifier: Arc<RecordingNotifier>,
    item_id: ItemId,
}

fn clock() -> Arc<TestClock> {
    Arc::new(TestClock::new(Utc::now()))
}

async fn fixture(clock: Arc<TestClock>) -> Fixture {
    let ledger = Arc::new(MemoryLedger::new());
    let bookings = Arc::new(MemoryBookingStore::new());
    let requests = Arc::new(MemoryCancellationStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let item_id = ItemId::new();
    ledger
        .register_item(InventoryItem::new(item_id, ItemKind::Tour, 5))
        .await
        .unwrap();
    let engine = CancellationEngine::new(
        Arc::clone(&bookings) as Arc<dyn BookingStore>,
        Arc::clone(&requests) as Arc<dyn CancellationStore>,
        Arc::clone(&ledger) as Arc<dyn InventoryLedger>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        clock,
    );
    Fixture {
        engine,
        bookings,
        ledger,
        notifier,
        item_id,
    }
}

/// Books 2 of 5 slots for a window 10 days out.
async fn booked(fx: &Fixture, now: chrono::DateTime<Utc>, paid: bool) -> Booking {
    let window =
        BookingWindow::new(now + Duration::days(10), now + Duration::days(12)).unwrap();
    let token = fx
        .ledger
        .reserve(fx.item_id, Some(window), 2, now + Duration::minutes(15))
        .await
        .unwrap();
    let mut booking = Booking::new(
        BookingId::new(),
        ItemKind::Tour,
        fx.item_id,
        RequesterId::new(),
        2,
        Some(window),
        Money::from_cents(20_000),
        Currency::Usd,
        token.hold_id,
        now,
    );
    if paid {
        fx.ledger.commit(&token).await.unwrap();
        booking.confirm_paid("pi_paid".to_string());
    }
    fx.bookings.insert(booking.clone()).await.unwrap();
    fx.bookings.get(&booking.id).await.unwrap()
}

#[tokio::test]
async fn unpaid_booking_cancels_immediately_and_frees_capacity() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, false).await;

    let outcome = fx
        .engine
        .request_cancellation(booking.id, "changed plans".to_string())
        .await
        .unwrap();
    let CancellationOutcome::Cancelled(cancelled) = outcome else {
        panic!("expected immediate cancellation");
    };
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        fx.ledger
            .availability(&fx.item_id, booking.window.as_ref())
            .await
            .unwrap(),
        5
    );
    assert_eq!(fx.notifier.cancelled(), vec![booking.id]);
}

#[tokio::test]
async fn paid_booking_queues_review_with_window_priority() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, true).await;

    let outcome = fx
        .engine
        .request_cancellation(booking.id, "changed plans".to_string())
        .await
        .unwrap();
    let CancellationOutcome::PendingReview(request) = outcome else {
        panic!("expected a review request");
    };
    // Window 10 days out: within 30 days but past the 7-day line
    assert_eq!(request.priority, CancellationPriority::Medium);
    assert_eq!(request.status, CancellationStatus::Pending);

    // The booking is untouched until a reviewer decides
    let stored = fx.bookings.get(&booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(
        fx.ledger
            .availability(&fx.item_id, booking.window.as_ref())
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn second_open_request_is_rejected() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, true).await;

    fx.engine
        .request_cancellation(booking.id, "first".to_string())
        .await
        .unwrap();
    let err = fx
        .engine
        .request_cancellation(booking.id, "second".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CancellationError::DuplicateRequest { .. }));
}

#[tokio::test]
async fn racing_requests_yield_exactly_one_open_request() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, true).await;
    let engine = Arc::new(fx.engine);

    let racers: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let booking_id = booking.id;
            tokio::spawn(
                async move { engine.request_cancellation(booking_id, format!("racer {i}")).await },
            )
        })
        .collect();
    let results: Vec<_> = futures::future::join_all(racers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(CancellationError::DuplicateRequest { .. })
        ));
    }
}

#[tokio::test]
async fn approval_refunds_and_returns_capacity() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, true).await;

    let CancellationOutcome::PendingReview(request) = fx
        .engine
        .request_cancellation(booking.id, "changed plans".to_string())
        .await
        .unwrap()
    else {
        panic!("expected a review request");
    };

    let reviewed = fx
        .engine
        .review(
            request.id,
            ReviewDecision::Approve {
                refund_amount: Money::from_cents(18_000),
                refund_method: RefundMethod::OriginalMethod,
            },
            ReviewerId::new(),
            Some("within policy".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(reviewed.status, CancellationStatus::Approved);
    assert_eq!(reviewed.refund_amount, Some(Money::from_cents(18_000)));

    let cancelled = fx.bookings.get(&booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    assert_eq!(
        fx.ledger
            .availability(&fx.item_id, booking.window.as_ref())
            .await
            .unwrap(),
        5
    );
    assert_eq!(fx.notifier.cancelled(), vec![booking.id]);
}

#[tokio::test]
async fn rejection_leaves_booking_confirmed() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, true).await;

    let CancellationOutcome::PendingReview(request) = fx
        .engine
        .request_cancellation(booking.id, "changed plans".to_string())
        .await
        .unwrap()
    else {
        panic!("expected a review request");
    };
    let reviewed = fx
        .engine
        .review(
            request.id,
            ReviewDecision::Reject,
            ReviewerId::new(),
            Some("outside policy".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(reviewed.status, CancellationStatus::Rejected);

    let stored = fx.bookings.get(&booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.payment_status, PaymentStatus::Paid);

    // With the first request closed, a new one may be opened
    let outcome = fx
        .engine
        .request_cancellation(booking.id, "asking again".to_string())
        .await
        .unwrap();
    assert!(matches!(outcome, CancellationOutcome::PendingReview(_)));
}

#[tokio::test]
async fn reviewing_twice_is_rejected() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, true).await;

    let CancellationOutcome::PendingReview(request) = fx
        .engine
        .request_cancellation(booking.id, "changed plans".to_string())
        .await
        .unwrap()
    else {
        panic!("expected a review request");
    };
    fx.engine
        .review(request.id, ReviewDecision::Reject, ReviewerId::new(), None)
        .await
        .unwrap();
    let err = fx
        .engine
        .review(
            request.id,
            ReviewDecision::Approve {
                refund_amount: Money::from_cents(1),
                refund_method: RefundMethod::Credit,
            },
            ReviewerId::new(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CancellationError::AlreadyReviewed(_)));
}

#[tokio::test]
async fn cancelled_booking_cannot_be_cancelled_again() {
    let clock = clock();
    let now = clock.now_value();
    let fx = fixture(clock).await;
    let booking = booked(&fx, now, false).await;

    fx.engine
        .request_cancellation(booking.id, "changed plans".to_string())
        .await
        .unwrap();
    let err = fx
        .engine
        .request_cancellation(booking.id, "again".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CancellationError::NotCancellable { .. }));
}

//! The unified booking aggregate and the cancellation-request record.
//!
//! One `Booking` shape covers all verticals; kind-specific behavior lives in
//! the catalog's pricing rules, not in per-vertical schemas. Bookings are
//! never hard-deleted: cancellation is a status transition so audit history
//! survives.

use crate::error::InvalidTransition;
use crate::types::{
    BookingId, BookingWindow, CancellationRequestId, Currency, HoldId, ItemId, ItemKind, Money,
    RequesterId, ReviewerId,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Booking lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Created, inventory held, awaiting payment confirmation
    PendingPayment,
    /// Payment confirmed against the gateway
    Confirmed,
    /// Service delivery underway (stay started, tour departed)
    InProgress,
    /// Service delivered
    Completed,
    /// Cancelled by requester, reviewer, or never-paid timeout cleanup
    Cancelled,
}

impl BookingStatus {
    /// Terminal statuses accept no further transitions
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Payment state, advanced only by the reconciliation handler and the
/// cancellation review path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// No settled charge yet
    Pending,
    /// Gateway confirmed a matching charge
    Paid,
    /// Charge failed or the hold lapsed; a new session may be opened
    Failed,
    /// Refund instructions recorded after an approved cancellation
    Refunded,
}

/// The unified reservation record.
///
/// Invariant: `status == Confirmed` implies `payment_status == Paid`. All
/// mutation goes through the transition methods, which enforce it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Unique booking identifier
    pub id: BookingId,
    /// Vertical this booking belongs to
    pub item_kind: ItemKind,
    /// Catalog item being booked
    pub item_id: ItemId,
    /// Who is booking
    pub requester: RequesterId,
    /// Participants / guests / units
    pub quantity: u32,
    /// Date window for dated kinds, `None` otherwise
    pub window: Option<BookingWindow>,
    /// Total amount due
    pub amount: Money,
    /// Currency the amount is tagged with
    pub currency: Currency,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Gateway reference of the latest payment session; only a confirmation
    /// carrying this reference can settle the booking
    pub payment_reference: Option<String>,
    /// Live inventory hold backing this booking, if any
    pub hold_id: Option<HoldId>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped by the store on update
    pub version: u64,
}

impl Booking {
    /// Creates a booking in `PendingPayment` with a live hold.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        id: BookingId,
        item_kind: ItemKind,
        item_id: ItemId,
        requester: RequesterId,
        quantity: u32,
        window: Option<BookingWindow>,
        amount: Money,
        currency: Currency,
        hold_id: HoldId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            item_kind,
            item_id,
            requester,
            quantity,
            window,
            amount,
            currency,
            status: BookingStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            hold_id: Some(hold_id),
            created_at,
            version: 0,
        }
    }

    /// Whether this booking is still waiting on a settled charge.
    #[must_use]
    pub const fn awaits_payment(&self) -> bool {
        matches!(self.status, BookingStatus::PendingPayment)
            && matches!(
                self.payment_status,
                PaymentStatus::Pending | PaymentStatus::Failed
            )
    }

    /// Records the gateway reference of a freshly opened payment session,
    /// superseding any previous session's reference.
    pub fn record_session(&mut self, reference: String) {
        self.payment_reference = Some(reference);
    }

    /// Marks the booking paid and confirmed against a settled gateway charge.
    pub fn confirm_paid(&mut self, reference: String) {
        self.status = BookingStatus::Confirmed;
        self.payment_status = PaymentStatus::Paid;
        self.payment_reference = Some(reference);
    }

    /// Backs the booking with a fresh hold for a payment retry, resetting
    /// the payment state to `Pending`.
    pub fn attach_hold(&mut self, hold_id: HoldId) {
        self.hold_id = Some(hold_id);
        self.payment_status = PaymentStatus::Pending;
    }

    /// Records a failed charge; the hold (if any) is gone and the booking is
    /// retryable with a fresh session.
    pub fn fail_payment(&mut self) {
        self.payment_status = PaymentStatus::Failed;
        self.hold_id = None;
    }

    /// Marks service delivery underway (stay started, tour departed).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] unless the booking is `Confirmed`.
    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        if self.status != BookingStatus::Confirmed {
            return Err(InvalidTransition { from: self.status });
        }
        self.status = BookingStatus::InProgress;
        Ok(())
    }

    /// Marks service delivery finished.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] unless the booking is `InProgress`.
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        if self.status != BookingStatus::InProgress {
            return Err(InvalidTransition { from: self.status });
        }
        self.status = BookingStatus::Completed;
        Ok(())
    }

    /// Transitions to `Cancelled`, clearing any live hold reference.
    pub fn cancel(&mut self) {
        self.status = BookingStatus::Cancelled;
        self.hold_id = None;
    }

    /// Cancels a paid booking with refund instructions recorded.
    ///
    /// The money movement itself is the gateway's job; this records that it
    /// was instructed.
    pub fn approve_refund(&mut self) {
        self.status = BookingStatus::Cancelled;
        self.payment_status = PaymentStatus::Refunded;
        self.hold_id = None;
    }
}

/// Review triage priority for a cancellation request, derived from how close
/// the booked window is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CancellationPriority {
    /// Window starts in more than 30 days
    Low,
    /// Window starts within 30 days, or the booking is undated
    Medium,
    /// Window starts within 7 days
    High,
    /// Window starts within 48 hours
    Urgent,
}

impl CancellationPriority {
    /// Derives priority from the booked window relative to `now`.
    #[must_use]
    pub fn for_window(window: Option<&BookingWindow>, now: DateTime<Utc>) -> Self {
        let Some(window) = window else {
            return Self::Medium;
        };
        let lead = window.start() - now;
        if lead <= Duration::hours(48) {
            Self::Urgent
        } else if lead <= Duration::days(7) {
            Self::High
        } else if lead <= Duration::days(30) {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Review state of a cancellation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationStatus {
    /// Awaiting a staff decision
    Pending,
    /// Approved; the booking was cancelled and refund instructions recorded
    Approved,
    /// Rejected; the booking is unchanged
    Rejected,
}

/// How an approved refund should be paid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundMethod {
    /// Back to the original payment method via the gateway
    OriginalMethod,
    /// As account credit toward a future booking
    Credit,
}

/// A staff-reviewed cancellation request, created only for paid bookings.
///
/// At most one request per booking may be `Pending` at a time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CancellationRequest {
    /// Unique request identifier
    pub id: CancellationRequestId,
    /// Booking this request targets
    pub booking_id: BookingId,
    /// Requester-supplied reason
    pub reason: String,
    /// Review triage priority
    pub priority: CancellationPriority,
    /// Review state
    pub status: CancellationStatus,
    /// Refund amount recorded on approval
    pub refund_amount: Option<Money>,
    /// Refund channel recorded on approval
    pub refund_method: Option<RefundMethod>,
    /// Free-form reviewer notes
    pub reviewer_notes: Option<String>,
    /// Reviewer who decided the request
    pub reviewed_by: Option<ReviewerId>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency version
    pub version: u64,
}

impl CancellationRequest {
    /// Creates a pending request.
    #[must_use]
    pub const fn new(
        id: CancellationRequestId,
        booking_id: BookingId,
        reason: String,
        priority: CancellationPriority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            booking_id,
            reason,
            priority,
            status: CancellationStatus::Pending,
            refund_amount: None,
            refund_method: None,
            reviewer_notes: None,
            reviewed_by: None,
            created_at,
            version: 0,
        }
    }

    /// Whether this request still awaits review.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, CancellationStatus::Pending)
    }

    /// Records an approval decision with its refund instructions.
    pub fn approve(
        &mut self,
        refund_amount: Money,
        refund_method: RefundMethod,
        reviewer: ReviewerId,
        notes: Option<String>,
    ) {
        self.status = CancellationStatus::Approved;
        self.refund_amount = Some(refund_amount);
        self.refund_method = Some(refund_method);
        self.reviewed_by = Some(reviewer);
        self.reviewer_notes = notes;
    }

    /// Records a rejection; the booking is left untouched.
    pub fn reject(&mut self, reviewer: ReviewerId, notes: Option<String>) {
        self.status = CancellationStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.reviewer_notes = notes;
    }
}

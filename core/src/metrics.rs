//! Metric counters for the reservation pipeline.
//!
//! Uses the `metrics` facade; exporter wiring is left to the embedding
//! application.

/// A booking was created and its hold placed.
pub fn record_booking_created() {
    metrics::counter!("tripledger_bookings_created_total").increment(1);
}

/// A reserve attempt lost the capacity race.
pub fn record_capacity_conflict() {
    metrics::counter!("tripledger_capacity_conflicts_total").increment(1);
}

/// A payment was confirmed and its hold committed.
pub fn record_payment_confirmed() {
    metrics::counter!("tripledger_payments_confirmed_total").increment(1);
}

/// A gateway confirmation failed verification.
pub fn record_verification_failed() {
    metrics::counter!("tripledger_verification_failures_total").increment(1);
}

/// Expired holds collected by the sweeper.
pub fn record_holds_swept(count: u64) {
    metrics::counter!("tripledger_holds_swept_total").increment(count);
}

/// A compensating release could not complete after retries.
pub fn record_compensation_failure() {
    metrics::counter!("tripledger_compensation_failures_total").increment(1);
}

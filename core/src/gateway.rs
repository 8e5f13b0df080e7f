//! Payment gateway boundary.
//!
//! Abstraction over hosted processors (Stripe `PaymentIntents`, `PayHere`
//! redirects). The reconciler trusts only [`PaymentGateway::verify`], the
//! gateway's authoritative record of a charge, never a client-supplied
//! status string.

use crate::error::GatewayError;
use crate::types::{BookingId, Currency, Money};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Settlement state of a charge on the gateway's side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeStatus {
    /// Funds captured
    Succeeded,
    /// Still processing on the gateway
    Pending,
    /// Declined or errored
    Failed {
        /// Gateway-supplied reason
        reason: String,
    },
}

/// The gateway's authoritative record of a charge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCharge {
    /// Gateway-assigned reference (e.g. a `PaymentIntent` id)
    pub reference: String,
    /// Settlement state
    pub status: ChargeStatus,
    /// Amount on the gateway record
    pub amount: Money,
    /// Currency on the gateway record
    pub currency: Currency,
}

/// An open payment session handed back to the caller's UI.
///
/// Ephemeral and gateway-scoped; kept only until reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Session identifier for the client
    pub session_id: String,
    /// Booking this session pays for
    pub booking_id: BookingId,
    /// Gateway reference to reconcile against later
    pub gateway_reference: String,
    /// Amount the session was opened for
    pub expected_amount: Money,
    /// Currency the session was opened in
    pub currency: Currency,
    /// When the session was opened
    pub created_at: DateTime<Utc>,
}

/// What a client call or webhook delivery asserts about a payment.
///
/// Carries only the reference; everything else is re-fetched from the
/// gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfirmation {
    /// Gateway reference the caller claims settled
    pub reference: String,
}

/// Payment gateway adapter.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session for a booking amount.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the gateway rejects the session.
    async fn create_session(
        &self,
        booking_id: BookingId,
        amount: Money,
        currency: Currency,
        metadata: serde_json::Value,
    ) -> Result<PaymentSession, GatewayError>;

    /// Fetches the authoritative charge for a reference.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownReference`] if the gateway has no such
    /// charge.
    async fn verify(&self, reference: &str) -> Result<GatewayCharge, GatewayError>;
}

/// Mock gateway for development: every session settles successfully.
///
/// Sessions and their charges are held in memory so `verify` answers with
/// the same amounts the session was opened for.
#[derive(Debug, Default)]
pub struct MockGateway {
    charges: Mutex<HashMap<String, GatewayCharge>>,
}

impl MockGateway {
    /// Creates a mock gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(
        &self,
        booking_id: BookingId,
        amount: Money,
        currency: Currency,
        _metadata: serde_json::Value,
    ) -> Result<PaymentSession, GatewayError> {
        // Simulate network delay
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        let reference = format!("mock_pi_{}", uuid::Uuid::new_v4());
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                reference.clone(),
                GatewayCharge {
                    reference: reference.clone(),
                    status: ChargeStatus::Succeeded,
                    amount,
                    currency,
                },
            );

        tracing::info!(
            booking_id = %booking_id,
            amount = amount.cents(),
            currency = %currency,
            reference = %reference,
            "mock payment session opened"
        );

        Ok(PaymentSession {
            session_id: format!("mock_sess_{}", uuid::Uuid::new_v4()),
            booking_id,
            gateway_reference: reference,
            expected_amount: amount,
            currency,
            created_at: Utc::now(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayCharge, GatewayError> {
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownReference(reference.to_string()))
    }
}

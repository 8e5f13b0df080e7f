//! Persistence traits for bookings and cancellation requests, with in-memory
//! implementations.
//!
//! Updates are guarded by a per-record version: a writer must present the
//! version it read, and the store rejects the write with
//! [`StoreError::VersionConflict`] if the record moved on. That keeps lost
//! updates out even when two logical operations race on the same booking.

use crate::booking::{Booking, BookingStatus, CancellationRequest, CancellationStatus};
use crate::error::StoreError;
use crate::types::{BookingId, CancellationRequestId, HoldId, RequesterId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Store for [`Booking`] records.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking at version 0.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if the id is already present.
    async fn insert(&self, booking: Booking) -> Result<(), StoreError>;

    /// Loads a booking by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BookingNotFound`] if absent.
    async fn get(&self, id: &BookingId) -> Result<Booking, StoreError>;

    /// Writes back a booking read earlier, bumping its version.
    ///
    /// The write succeeds only if `booking.version` matches the stored
    /// version; the returned record carries the new version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] if the record changed since
    /// it was read, [`StoreError::BookingNotFound`] if it was never inserted.
    async fn update(&self, booking: Booking) -> Result<Booking, StoreError>;

    /// Finds the booking backed by a given inventory hold, if any.
    ///
    /// # Errors
    ///
    /// Backend errors only; no match is `Ok(None)`.
    async fn find_by_hold(&self, hold_id: &HoldId) -> Result<Option<Booking>, StoreError>;

    /// Lists a requester's bookings, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Backend errors only.
    async fn list_by_requester(
        &self,
        requester: &RequesterId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError>;
}

/// Store for [`CancellationRequest`] records.
#[async_trait]
pub trait CancellationStore: Send + Sync {
    /// Inserts a new request at version 0.
    ///
    /// The one-open-request-per-booking check happens inside the insert, in
    /// the store's own critical section, so two concurrent requests for the
    /// same booking can never both get in.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if the id is already present,
    /// [`StoreError::OpenRequestExists`] if the booking already has a
    /// pending request.
    async fn insert(&self, request: CancellationRequest) -> Result<(), StoreError>;

    /// Loads a request by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RequestNotFound`] if absent.
    async fn get(&self, id: &CancellationRequestId) -> Result<CancellationRequest, StoreError>;

    /// Writes back a request read earlier, bumping its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] on a stale version,
    /// [`StoreError::RequestNotFound`] if it was never inserted.
    async fn update(&self, request: CancellationRequest)
        -> Result<CancellationRequest, StoreError>;

    /// The open (`Pending`) request for a booking, if one exists.
    ///
    /// # Errors
    ///
    /// Backend errors only; no match is `Ok(None)`.
    async fn find_open_for(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<CancellationRequest>, StoreError>;

    /// All requests awaiting review, for the staff surface.
    ///
    /// # Errors
    ///
    /// Backend errors only.
    async fn list_pending(&self) -> Result<Vec<CancellationRequest>, StoreError>;
}

/// In-memory booking store.
#[derive(Debug, Default)]
pub struct MemoryBookingStore {
    records: Mutex<HashMap<BookingId, Booking>>,
}

impl MemoryBookingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BookingId, Booking>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn insert(&self, mut booking: Booking) -> Result<(), StoreError> {
        let mut records = self.lock();
        if records.contains_key(&booking.id) {
            return Err(StoreError::DuplicateId(booking.id.to_string()));
        }
        booking.version = 0;
        records.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, id: &BookingId) -> Result<Booking, StoreError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or(StoreError::BookingNotFound(*id))
    }

    async fn update(&self, mut booking: Booking) -> Result<Booking, StoreError> {
        let mut records = self.lock();
        let stored = records
            .get_mut(&booking.id)
            .ok_or(StoreError::BookingNotFound(booking.id))?;
        if stored.version != booking.version {
            return Err(StoreError::VersionConflict {
                expected: booking.version,
                actual: stored.version,
            });
        }
        booking.version += 1;
        *stored = booking.clone();
        Ok(booking)
    }

    async fn find_by_hold(&self, hold_id: &HoldId) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .lock()
            .values()
            .find(|booking| booking.hold_id.as_ref() == Some(hold_id))
            .cloned())
    }

    async fn list_by_requester(
        &self,
        requester: &RequesterId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .lock()
            .values()
            .filter(|booking| {
                booking.requester == *requester
                    && status.is_none_or(|wanted| booking.status == wanted)
            })
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| booking.created_at);
        Ok(bookings)
    }
}

/// In-memory cancellation-request store.
#[derive(Debug, Default)]
pub struct MemoryCancellationStore {
    records: Mutex<HashMap<CancellationRequestId, CancellationRequest>>,
}

impl MemoryCancellationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<CancellationRequestId, CancellationRequest>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CancellationStore for MemoryCancellationStore {
    async fn insert(&self, mut request: CancellationRequest) -> Result<(), StoreError> {
        let mut records = self.lock();
        if records.contains_key(&request.id) {
            return Err(StoreError::DuplicateId(request.id.to_string()));
        }
        // Check-then-insert under the one lock, same discipline as the
        // ledger's reserve path.
        if let Some(open) = records
            .values()
            .find(|existing| existing.booking_id == request.booking_id && existing.is_open())
        {
            return Err(StoreError::OpenRequestExists {
                booking_id: request.booking_id,
                request_id: open.id,
            });
        }
        request.version = 0;
        records.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: &CancellationRequestId) -> Result<CancellationRequest, StoreError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or(StoreError::RequestNotFound(*id))
    }

    async fn update(
        &self,
        mut request: CancellationRequest,
    ) -> Result<CancellationRequest, StoreError> {
        let mut records = self.lock();
        let stored = records
            .get_mut(&request.id)
            .ok_or(StoreError::RequestNotFound(request.id))?;
        if stored.version != request.version {
            return Err(StoreError::VersionConflict {
                expected: request.version,
                actual: stored.version,
            });
        }
        request.version += 1;
        *stored = request.clone();
        Ok(request)
    }

    async fn find_open_for(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<CancellationRequest>, StoreError> {
        Ok(self
            .lock()
            .values()
            .find(|request| request.booking_id == *booking_id && request.is_open())
            .cloned())
    }

    async fn list_pending(&self) -> Result<Vec<CancellationRequest>, StoreError> {
        let mut pending: Vec<CancellationRequest> = self
            .lock()
            .values()
            .filter(|request| request.status == CancellationStatus::Pending)
            .cloned()
            .collect();
        // Urgent first, oldest first within a priority
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(pending)
    }
}

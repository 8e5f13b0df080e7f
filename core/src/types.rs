//! Domain value objects for the reservation-payment core.
//!
//! Identifiers are newtypes over `Uuid` so a booking id can never be passed
//! where a hold id is expected. Money is cents-based with checked arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a bookable catalog item
    ItemId
);
id_type!(
    /// Unique identifier for a booking
    BookingId
);
id_type!(
    /// Unique identifier for the person making a booking
    RequesterId
);
id_type!(
    /// Unique identifier for an inventory hold
    HoldId
);
id_type!(
    /// Unique identifier for a cancellation request
    CancellationRequestId
);
id_type!(
    /// Unique identifier for a staff reviewer
    ReviewerId
);

// ============================================================================
// Item kinds
// ============================================================================

/// The verticals a booking can target.
///
/// Dated kinds occupy a time window; undated kinds are booked as a whole
/// (a single vehicle rental slot, a one-off custom trip request).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// A hotel room type
    Hotel,
    /// A scheduled tour with a participant cap
    Tour,
    /// A rentable vehicle
    Vehicle,
    /// A bookable guide
    Guide,
    /// A custom trip request quoted individually
    CustomTrip,
}

impl ItemKind {
    /// Whether bookings of this kind carry a date window
    #[must_use]
    pub const fn is_dated(self) -> bool {
        matches!(self, Self::Hotel | Self::Tour | Self::Guide)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hotel => "hotel",
            Self::Tour => "tour",
            Self::Vehicle => "vehicle",
            Self::Guide => "guide",
            Self::CustomTrip => "custom-trip",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Booking window
// ============================================================================

/// A half-open `[start, end)` date window for dated bookings.
///
/// Construction enforces `start < end`; callers validate "start in the
/// future" separately since that depends on the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BookingWindow {
    /// Creates a window, rejecting `start >= end`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidWindow`] when the window is empty or
    /// inverted.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, crate::error::LedgerError> {
        if start >= end {
            return Err(crate::error::LedgerError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window start (inclusive)
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Window end (exclusive)
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether two windows share any instant
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for BookingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

// ============================================================================
// Money (cents-based to avoid floating point errors)
// ============================================================================

/// Represents an amount in minor units (cents) to avoid floating-point
/// arithmetic errors. Currency is tagged separately via [`Currency`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from major units with overflow checking
    #[must_use]
    pub const fn checked_from_major(major: u64) -> Option<Self> {
        match major.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts `other`, returning `None` if the result would be negative
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Multiplies by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Computes `percent` percent of this amount with overflow checking.
    ///
    /// Used for percentage surcharges (e.g. insurance at 5%).
    #[must_use]
    pub const fn checked_percent(self, percent: u32) -> Option<Self> {
        match self.0.checked_mul(percent as u64) {
            Some(product) => Some(Self(product / 100)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// ISO-4217 currencies the gateway adapters accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// United States dollar
    Usd,
    /// Euro
    Eur,
    /// Sri Lankan rupee
    Lkr,
}

impl Currency {
    /// The ISO-4217 code for this currency
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Lkr => "LKR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

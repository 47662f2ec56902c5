//! Reservation error taxonomy.

use common::{EventId, TierId};
use ledger::LedgerError;
use thiserror::Error;

/// Errors surfaced by the reservation engine.
///
/// `InsufficientStock` is an expected business decline; `Busy` is transient
/// and retryable by the caller (the engine never retries internally); the
/// rest are system faults.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The referenced event does not exist.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// The referenced tier does not exist under the given event.
    #[error("tier not found: {0}")]
    TierNotFound(TierId),

    /// The tier has fewer units left than requested. Ledger and cache are
    /// unchanged.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// The tier's row lock could not be acquired within the bounded wait.
    #[error("tier {0} is busy, retry later")]
    Busy(TierId),

    /// Zero-quantity requests are rejected before touching the ledger.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// A fault inside the atomic ledger unit. The transaction was rolled
    /// back in full.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl ReservationError {
    /// Returns true if the caller may usefully resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReservationError::Busy(_))
    }

    /// Returns true if this is an expected business decline rather than a
    /// system fault.
    pub fn is_decline(&self) -> bool {
        matches!(self, ReservationError::InsufficientStock { .. })
    }
}

impl From<LedgerError> for ReservationError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::EventNotFound(id) => ReservationError::EventNotFound(id),
            LedgerError::TierNotFound(id) => ReservationError::TierNotFound(id),
            LedgerError::InsufficientStock {
                requested,
                available,
                ..
            } => ReservationError::InsufficientStock {
                requested,
                available,
            },
            LedgerError::LockBusy(id) => ReservationError::Busy(id),
            other => ReservationError::Ledger(other),
        }
    }
}

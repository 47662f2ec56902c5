use common::{EventId, TierId};
use thiserror::Error;

/// Errors that can occur when interacting with the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The referenced event does not exist.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// The referenced tier does not exist (or belongs to a different event).
    #[error("tier not found: {0}")]
    TierNotFound(TierId),

    /// The tier has fewer units left than the reservation asked for.
    ///
    /// This is an expected business decline, not a system fault.
    #[error("insufficient stock for tier {tier_id}: requested {requested}, available {available}")]
    InsufficientStock {
        tier_id: TierId,
        requested: u32,
        available: u32,
    },

    /// The tier's row lock could not be acquired within the bounded wait.
    ///
    /// Transient; the caller may retry. The ledger never retries internally.
    #[error("tier {0} is locked by a concurrent reservation")]
    LockBusy(TierId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A fault committing the atomic stock-plus-order write.
    ///
    /// The transaction is rolled back in full; no partial decrement survives.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

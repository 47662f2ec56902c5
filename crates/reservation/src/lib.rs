//! Purchase state machine for the reservation engine.
//!
//! A purchase enters the engine, mutates the ledger inside one atomic unit,
//! then updates the advisory cache and fires the live feed. Only faults
//! inside the atomic unit roll anything back; the cache and feed are
//! best-effort satellites whose failures are logged and isolated from the
//! reservation's outcome.

pub mod engine;
pub mod error;
pub mod phase;

pub use engine::{Purchase, ReservationEngine};
pub use error::ReservationError;
pub use phase::PurchasePhase;

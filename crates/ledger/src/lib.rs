//! Authoritative ledger of tier stock and committed orders.
//!
//! The ledger is the only place where conservation of inventory is enforced.
//! A reservation acquires exclusive access to one tier row (bounded wait),
//! checks stock under the lock, and decrements stock and inserts the order
//! in a single atomic unit. Everything downstream of the ledger (cache,
//! live feed) is advisory.
//!
//! Two backends implement the same traits: [`InMemoryLedger`] for tests and
//! single-process deployments, and [`PostgresLedger`] for durable storage.

pub mod error;
pub mod event;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod store;
pub mod tier;

pub use common::{BuyerId, EventId, Money, OrderId, TierId};
pub use error::{LedgerError, Result};
pub use event::{NewTicketEvent, NewTier, TicketEvent};
pub use memory::InMemoryLedger;
pub use order::{Order, SalesTotals};
pub use postgres::PostgresLedger;
pub use store::{DEFAULT_LOCK_TIMEOUT, Ledger, OrderJournal, Reservation};
pub use tier::Tier;

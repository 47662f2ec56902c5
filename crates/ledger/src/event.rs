//! Ticketed events and the authoring inputs that create them.

use chrono::{DateTime, Utc};
use common::{EventId, Money};
use serde::{Deserialize, Serialize};

/// A ticketed event that owns pricing tiers by identifier.
///
/// The event never holds a live list of its tiers; tiers reference their
/// owner through `event_id` and are looked up on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketEvent {
    pub id: EventId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Input for authoring a new event together with its pricing structure.
#[derive(Debug, Clone)]
pub struct NewTicketEvent {
    pub title: String,
    pub tiers: Vec<NewTier>,
}

impl NewTicketEvent {
    /// Creates an authoring input with no tiers.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tiers: Vec::new(),
        }
    }

    /// Adds a tier to the pricing structure.
    pub fn with_tier(mut self, name: impl Into<String>, price: Money, initial_stock: u32) -> Self {
        self.tiers.push(NewTier {
            name: name.into(),
            price,
            initial_stock,
        });
        self
    }
}

/// A tier definition inside a [`NewTicketEvent`].
#[derive(Debug, Clone)]
pub struct NewTier {
    pub name: String,
    pub price: Money,
    pub initial_stock: u32,
}

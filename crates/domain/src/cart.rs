use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of a session cart. Ephemeral: lives in the session store,
/// never persisted, and never trusted for pricing — checkout re-prices
/// every entry from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub item_id: Uuid,
    pub count: i64,
}

impl CartEntry {
    pub fn new(item_id: Uuid, count: i64) -> Self {
        Self { item_id, count }
    }

    /// Entries with a non-positive count are dropped at checkout, not rejected.
    pub fn is_orderable(&self) -> bool {
        self.count > 0
    }
}

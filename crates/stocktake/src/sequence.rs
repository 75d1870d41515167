//! Fetch ordering for concurrent refreshes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Ticket for one dispatched fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    id: u64,
}

/// Hands out monotonically increasing fetch ids and remembers, per table,
/// the newest one dispatched.
///
/// Concurrent fetches for the same table can complete in any order. A fetch
/// whose ticket is no longer the newest dispatched for its table is out of
/// date; its result must be discarded, never applied over newer data.
#[derive(Debug)]
pub struct FetchSequencer {
    /// Next ticket id (shared across tables).
    next_id: AtomicU64,

    /// Newest dispatched ticket per table.
    latest: Mutex<HashMap<String, u64>>,
}

impl FetchSequencer {
    /// Create a sequencer with no dispatch history.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new fetch for a table.
    ///
    /// The returned ticket supersedes every earlier ticket for that table.
    pub fn begin(&self, table: &str) -> FetchTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.latest.lock().insert(table.to_string(), id);
        FetchTicket { id }
    }

    /// Whether the ticket is still the newest dispatched for the table.
    pub fn is_current(&self, table: &str, ticket: FetchTicket) -> bool {
        self.latest.lock().get(table) == Some(&ticket.id)
    }

    /// Forget a table's dispatch history.
    ///
    /// All outstanding tickets for the table stop being current, so an
    /// in-flight fetch can no longer apply.
    pub fn forget(&self, table: &str) {
        self.latest.lock().remove(table);
    }

    /// Forget every table's dispatch history.
    pub fn forget_all(&self) {
        self.latest.lock().clear();
    }
}

impl Default for FetchSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_is_current_until_superseded() {
        let sequencer = FetchSequencer::new();

        let first = sequencer.begin("items");
        assert!(sequencer.is_current("items", first));

        let second = sequencer.begin("items");
        assert!(!sequencer.is_current("items", first));
        assert!(sequencer.is_current("items", second));
    }

    #[test]
    fn test_tables_sequence_independently() {
        let sequencer = FetchSequencer::new();

        let items = sequencer.begin("items");
        let users = sequencer.begin("users");

        // A dispatch for one table never supersedes another table's ticket.
        assert!(sequencer.is_current("items", items));
        assert!(sequencer.is_current("users", users));
    }

    #[test]
    fn test_unknown_table_has_no_current_ticket() {
        let sequencer = FetchSequencer::new();
        let ticket = sequencer.begin("items");

        assert!(!sequencer.is_current("users", ticket));
    }

    #[test]
    fn test_forget_invalidates_outstanding_tickets() {
        let sequencer = FetchSequencer::new();
        let ticket = sequencer.begin("items");

        sequencer.forget("items");

        assert!(!sequencer.is_current("items", ticket));
    }

    #[test]
    fn test_forget_all() {
        let sequencer = FetchSequencer::new();
        let items = sequencer.begin("items");
        let users = sequencer.begin("users");

        sequencer.forget_all();

        assert!(!sequencer.is_current("items", items));
        assert!(!sequencer.is_current("users", users));
    }
}

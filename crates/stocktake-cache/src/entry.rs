//! Table entries and the derived freshness states.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Age past which a populated entry stops being served from cache.
///
/// One value for every table; the background refresh loops tick at this same
/// period, so a healthy table is re-populated just as it ages out. There is
/// no per-table override.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Derived freshness of a table entry.
///
/// Never stored: computed from the entry and the clock at the moment of
/// observation. An entry that is both stale-flagged and older than
/// [`SYNC_INTERVAL`] reads as [`Stale`](TableState::Stale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableState {
    /// No payload has ever been stored, or the entry was cleared.
    Empty,

    /// Populated within the last [`SYNC_INTERVAL`].
    Fresh,

    /// Populated longer ago than [`SYNC_INTERVAL`].
    Aged,

    /// A background refresh failed since the last populate.
    Stale,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableState::Empty => write!(f, "empty"),
            TableState::Fresh => write!(f, "fresh"),
            TableState::Aged => write!(f, "aged"),
            TableState::Stale => write!(f, "stale"),
        }
    }
}

/// One table's cache slot.
///
/// The payload is shared through an [`Arc`]: cloning an entry never copies
/// row data, and callers can never mutate a cached payload in place. A
/// populate replaces the whole `Arc`.
#[derive(Debug)]
pub struct TableEntry<T> {
    /// Cached payload, absent until the first successful populate.
    pub rows: Option<Arc<T>>,

    /// Wall-clock time of the last successful populate (`None` = never).
    pub last_updated: Option<DateTime<Utc>>,

    /// Monotonic basis for age computation.
    pub refreshed_at: Option<Instant>,

    /// Incremented by one on every successful populate, starting from 0.
    pub version: u64,

    /// Set when a background refresh fails; cleared by every populate.
    pub stale: bool,
}

impl<T> TableEntry<T> {
    /// Create an empty entry: no payload, version 0, not stale.
    pub(crate) fn new() -> Self {
        Self {
            rows: None,
            last_updated: None,
            refreshed_at: None,
            version: 0,
            stale: false,
        }
    }

    /// Replace the payload and stamp the entry.
    ///
    /// Unconditional: last write wins, no merging. Returns the new version.
    pub(crate) fn populate(&mut self, rows: T, now: Instant, stamp: DateTime<Utc>) -> u64 {
        self.rows = Some(Arc::new(rows));
        self.last_updated = Some(stamp);
        self.refreshed_at = Some(now);
        self.version += 1;
        self.stale = false;
        self.version
    }

    /// Age of the payload relative to `now` (`None` when never populated).
    pub fn age_at(&self, now: Instant) -> Option<Duration> {
        self.refreshed_at.map(|at| now.saturating_duration_since(at))
    }

    /// Age of the payload right now.
    pub fn age(&self) -> Option<Duration> {
        self.age_at(Instant::now())
    }

    /// Derived freshness at the given instant.
    pub fn state_at(&self, now: Instant) -> TableState {
        if self.rows.is_none() {
            return TableState::Empty;
        }
        if self.stale {
            return TableState::Stale;
        }
        match self.age_at(now) {
            Some(age) if age >= SYNC_INTERVAL => TableState::Aged,
            _ => TableState::Fresh,
        }
    }

    /// Derived freshness right now.
    pub fn state(&self) -> TableState {
        self.state_at(Instant::now())
    }

    /// Whether a read may be served from this entry at the given instant.
    ///
    /// False whenever a forced refresh was requested, no payload is present,
    /// the payload is older than [`SYNC_INTERVAL`], or a background refresh
    /// has marked the entry stale.
    pub fn is_valid_at(&self, now: Instant, force_refresh: bool) -> bool {
        !force_refresh && self.state_at(now) == TableState::Fresh
    }

    /// Whether a read may be served from this entry right now.
    pub fn is_valid(&self, force_refresh: bool) -> bool {
        self.is_valid_at(Instant::now(), force_refresh)
    }
}

impl<T> Clone for TableEntry<T> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            last_updated: self.last_updated,
            refreshed_at: self.refreshed_at,
            version: self.version,
            stale: self.stale,
        }
    }
}

impl<T> Default for TableEntry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A read of a populated table, with the snapshot's provenance attached.
///
/// Only constructible from an entry that holds a payload, so consumers that
/// receive one never have to re-check for absence.
#[derive(Debug)]
pub struct TableRead<T> {
    /// The cached payload.
    pub rows: Arc<T>,

    /// Version of the snapshot this read observed.
    pub version: u64,

    /// Wall-clock time the snapshot was taken.
    pub last_updated: DateTime<Utc>,

    /// Monotonic populate instant, for age computation.
    pub refreshed_at: Instant,
}

impl<T> TableRead<T> {
    /// Build a read from an entry; `None` when the entry holds no payload.
    pub(crate) fn from_entry(entry: &TableEntry<T>) -> Option<Self> {
        Some(Self {
            rows: Arc::clone(entry.rows.as_ref()?),
            version: entry.version,
            last_updated: entry.last_updated?,
            refreshed_at: entry.refreshed_at?,
        })
    }

    /// Age of the snapshot relative to `now`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.refreshed_at)
    }

    /// Age of the snapshot right now.
    pub fn age(&self) -> Duration {
        self.age_at(Instant::now())
    }

    /// Consume the read, keeping only the payload.
    pub fn into_rows(self) -> Arc<T> {
        self.rows
    }
}

impl<T> Clone for TableRead<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            version: self.version,
            last_updated: self.last_updated,
            refreshed_at: self.refreshed_at,
        }
    }
}

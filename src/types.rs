// =============================================================================
// Shared types used across the ShadowPips chart service
// =============================================================================

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// Opaque, sortable bar key. Sources send either an epoch number or a string
/// (usually an ISO-8601 timestamp); a single document must not mix the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Epoch(i64),
    Text(String),
}

impl Timestamp {
    /// Compare two keys of the same kind. Returns `None` for mixed kinds,
    /// which have no meaningful order.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Epoch(a), Self::Epoch(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoch(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One OHLC price bar. Immutable once fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub time: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    /// Candle tuple in the order chart widgets expect: `[open, close, low, high]`.
    pub fn candle(&self) -> [f64; 4] {
        [self.open, self.close, self.low, self.high]
    }
}

/// A price-level annotation from the order feed. Regenerated every pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAnnotation {
    pub price: f64,
    pub label: String,
}

/// Observable phase of the refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Idle,
    Fetching,
    Computing,
    Rendering,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Fetching => write!(f, "Fetching"),
            Self::Computing => write!(f, "Computing"),
            Self::Rendering => write!(f, "Rendering"),
        }
    }
}

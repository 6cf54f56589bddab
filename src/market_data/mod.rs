// =============================================================================
// Market data collaborators: price series source and order feed
// =============================================================================

pub mod client;
pub mod parse;

pub use client::{FeedClient, HttpOrderFeed, HttpSeriesSource};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{OrderAnnotation, PriceBar};

/// Recoverable data-source failures. A pass that hits one is abandoned and
/// the previous chart stays on screen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Transport failure or non-2xx response.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Payload failed schema validation.
    #[error("malformed data: {0}")]
    Malformed(String),
}

/// Supplies the ordered OHLC bar sequence.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn fetch_series(&self) -> Result<Vec<PriceBar>, FeedError>;
}

/// Supplies price-level annotations.
#[async_trait]
pub trait OrderFeed: Send + Sync {
    async fn fetch_orders(&self) -> Result<Vec<OrderAnnotation>, FeedError>;
}

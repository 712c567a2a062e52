//! Price source trait definition.

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::PriceSnapshot;

/// A collaborator that produces per-karat price snapshots.
///
/// Implementations make exactly one attempt per call. Timeouts, retry
/// cadence, and payload checks against the configured karats are applied
/// by [`SnapshotFetcher`](super::SnapshotFetcher) and the scheduler.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use dzgold_market_data::{FetchError, PriceSnapshot, PriceSource};
///
/// struct ShopBoard;
///
/// #[async_trait]
/// impl PriceSource for ShopBoard {
///     fn id(&self) -> &'static str {
///         "SHOP_BOARD"
///     }
///
///     async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
///         // ... read the board
///     }
/// }
/// ```
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Constant identifier used in logs, e.g. "HTTP_JSON".
    fn id(&self) -> &'static str;

    /// Fetch one snapshot.
    async fn fetch(&self) -> Result<PriceSnapshot, FetchError>;
}

use async_trait::async_trait;
use deepbrief_core::{ProviderKind, SearchError, SearchHit};

/// Capability implemented by every search backend adapter.
///
/// New backends plug in by implementing this trait; the gateway and
/// everything downstream depend only on the capability.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Execute one query, returning up to `max_results` unscored candidates
    /// in the backend's native ranking order.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, SearchError>;

    fn kind(&self) -> ProviderKind;
}

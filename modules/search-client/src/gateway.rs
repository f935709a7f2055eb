use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use deepbrief_core::SearchHit;

use crate::provider::SearchProvider;

/// Query one provider with a timeout, mapping any failure or timeout to an
/// empty result set. Paired with its merge priority for stable ordering.
async fn run_provider(
    provider: Arc<dyn SearchProvider>,
    priority: usize,
    query: &str,
    timeout: Duration,
    results_per_provider: usize,
) -> (usize, Vec<SearchHit>) {
    let kind = provider.kind();
    match tokio::time::timeout(timeout, provider.search(query, results_per_provider)).await {
        Ok(Ok(hits)) => {
            info!(provider = %kind, query, count = hits.len(), "Search complete");
            (priority, hits)
        }
        Ok(Err(e)) => {
            warn!(provider = %kind, query, error = %e, "Search provider failed");
            (priority, Vec::new())
        }
        Err(_) => {
            warn!(
                provider = %kind,
                query,
                timeout_secs = timeout.as_secs(),
                "Search provider timed out"
            );
            (priority, Vec::new())
        }
    }
}

/// Fans one query out across the enabled providers and merges the results.
pub struct SearchGateway {
    /// Merge-priority order: earlier providers win ties.
    providers: Vec<Arc<dyn SearchProvider>>,
    timeout: Duration,
    results_per_provider: usize,
}

impl SearchGateway {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        timeout: Duration,
        results_per_provider: usize,
    ) -> Self {
        Self {
            providers,
            timeout,
            results_per_provider,
        }
    }

    /// Execute one query against all providers concurrently.
    ///
    /// Never fails: a provider that errors or exceeds the timeout is treated
    /// as returning zero results. Merge order is stable — provider priority,
    /// then native result order — with exact-URL duplicates dropped
    /// first-seen-wins.
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let timeout = self.timeout;
        let results_per_provider = self.results_per_provider;
        let provider_count = self.providers.len();
        let tasks: Vec<_> = self
            .providers
            .iter()
            .cloned()
            .enumerate()
            .map(|(priority, provider)| {
                run_provider(provider, priority, query, timeout, results_per_provider)
            })
            .collect();
        let mut per_provider: Vec<(usize, Vec<SearchHit>)> = stream::iter(tasks)
            .buffer_unordered(provider_count.max(1))
            .collect()
            .await;

        per_provider.sort_by_key(|(priority, _)| *priority);

        let mut seen = HashSet::new();
        let merged: Vec<SearchHit> = per_provider
            .into_iter()
            .flat_map(|(_, hits)| hits)
            .filter(|hit| seen.insert(hit.url.clone()))
            .collect();

        info!(query, total = merged.len(), "Search aggregation complete");
        merged
    }
}

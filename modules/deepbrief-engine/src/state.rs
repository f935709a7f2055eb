use std::collections::HashSet;

use deepbrief_core::SourceRecord;

/// Loop phases of one research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    GeneratingQuery,
    Searching,
    Validating,
    Summarizing,
    Reflecting,
    Finalizing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GeneratingQuery => write!(f, "generating query"),
            Self::Searching => write!(f, "searching"),
            Self::Validating => write!(f, "validating sources"),
            Self::Summarizing => write!(f, "summarizing"),
            Self::Reflecting => write!(f, "reflecting"),
            Self::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// Mutable state for one research run.
///
/// Owned exclusively by the engine; collaborators get immutable borrows and
/// return new values instead of mutating shared state.
#[derive(Debug, Clone)]
pub struct ResearchState {
    pub topic: String,
    /// Completed loops. Invariant: 0 ≤ loop_count ≤ max_loops.
    pub loop_count: u32,
    /// Accumulated markdown. Empty before the first summarization; extended,
    /// never cleared.
    pub running_summary: String,
    /// Query used by the current iteration.
    pub search_query: String,
    /// Every query issued this run, in order.
    pub query_history: Vec<String>,
    /// Validated sources, append-only across loops. URLs pairwise distinct.
    pub sources_gathered: Vec<SourceRecord>,
    /// The dedup ledger: normalized URLs already gathered this run.
    pub seen_urls: HashSet<String>,
    /// Reflector output driving the next query. Empty until after loop 1.
    pub knowledge_gap: String,
    /// Search retries taken in the current loop. Reset each loop.
    pub retry_count_this_loop: u32,
    /// The current loop exhausted its retries with no valid source.
    pub validation_failed_terminal: bool,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            loop_count: 0,
            running_summary: String::new(),
            search_query: String::new(),
            query_history: Vec::new(),
            sources_gathered: Vec::new(),
            seen_urls: HashSet::new(),
            knowledge_gap: String::new(),
            retry_count_this_loop: 0,
            validation_failed_terminal: false,
        }
    }

    /// Whether `query` is a normalized duplicate of any history entry.
    pub fn is_repeat_query(&self, query: &str) -> bool {
        let normalized = normalize_query(query);
        self.query_history
            .iter()
            .any(|q| normalize_query(q) == normalized)
    }

    /// Record a query as issued for the current iteration.
    pub fn record_query(&mut self, query: String) {
        self.search_query = query.clone();
        self.query_history.push(query);
    }
}

/// Case- and whitespace-insensitive query comparison key.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stats from a research run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub loops_completed: u32,
    pub queries_issued: u32,
    pub candidates_seen: u32,
    pub duplicates_dropped: u32,
    pub below_threshold: u32,
    pub sources_kept: u32,
    pub search_retries: u32,
    pub loops_without_sources: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Research Run Complete ===")?;
        writeln!(f, "Loops completed:    {}", self.loops_completed)?;
        writeln!(f, "Queries issued:     {}", self.queries_issued)?;
        writeln!(f, "Candidates seen:    {}", self.candidates_seen)?;
        writeln!(f, "Duplicates dropped: {}", self.duplicates_dropped)?;
        writeln!(f, "Below threshold:    {}", self.below_threshold)?;
        writeln!(f, "Sources kept:       {}", self.sources_kept)?;
        writeln!(f, "Search retries:     {}", self.search_retries)?;
        write!(f, "Loops w/o sources:  {}", self.loops_without_sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_normalization_ignores_case_and_whitespace() {
        assert_eq!(
            normalize_query("  Quantum   Error\tCorrection "),
            normalize_query("quantum error correction")
        );
    }

    #[test]
    fn repeat_detection_uses_normalized_form() {
        let mut state = ResearchState::new("topic");
        state.record_query("Rust async runtimes 2026".to_string());
        assert!(state.is_repeat_query("rust  async RUNTIMES 2026"));
        assert!(!state.is_repeat_query("rust async runtimes benchmarks"));
    }

    #[test]
    fn new_state_is_empty() {
        let state = ResearchState::new("t");
        assert_eq!(state.loop_count, 0);
        assert!(state.running_summary.is_empty());
        assert!(state.seen_urls.is_empty());
        assert!(!state.validation_failed_terminal);
    }
}

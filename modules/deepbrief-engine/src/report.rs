//! Report finalization: running summary plus the citation list.

use deepbrief_core::{normalize_url, Citation, ResearchReport};

use crate::state::ResearchState;

/// Build the final report from a finished run.
///
/// Citations are deduplicated by normalized URL (belt over the ledger
/// invariant) and numbered in gathering order, matching the inline `[n]`
/// markers the summarizer emits.
pub fn finalize(state: &ResearchState, aborted: bool) -> ResearchReport {
    let mut seen = std::collections::HashSet::new();
    let sources: Vec<Citation> = state
        .sources_gathered
        .iter()
        .filter(|record| seen.insert(normalize_url(&record.url)))
        .map(|record| Citation {
            url: record.url.clone(),
            title: record.title.clone(),
        })
        .collect();

    let mut summary = format!("## Summary\n\n{}\n", state.running_summary);
    if !sources.is_empty() {
        summary.push_str("\n### Sources\n\n");
        for (i, citation) in sources.iter().enumerate() {
            summary.push_str(&format!(
                "{}. [{}]({})\n",
                i + 1,
                citation.title,
                citation.url,
            ));
        }
    }

    ResearchReport {
        summary,
        sources,
        loops_completed: state.loop_count,
        insufficient_sources: state.sources_gathered.is_empty(),
        aborted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepbrief_core::{ProviderKind, SearchHit, SourceRecord};

    fn record(url: &str, title: &str) -> SourceRecord {
        SourceRecord::from_hit(SearchHit::new(url, title, "content", ProviderKind::Tavily), 0.8)
    }

    #[test]
    fn citations_numbered_in_gathering_order() {
        let mut state = ResearchState::new("topic");
        state.running_summary = "Findings [1] and [2].".to_string();
        state.sources_gathered.push(record("https://a.example.com", "Alpha"));
        state.sources_gathered.push(record("https://b.example.com", "Beta"));
        state.loop_count = 2;

        let report = finalize(&state, false);
        assert!(report.summary.contains("1. [Alpha](https://a.example.com)"));
        assert!(report.summary.contains("2. [Beta](https://b.example.com)"));
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.loops_completed, 2);
        assert!(!report.insufficient_sources);
    }

    #[test]
    fn equivalent_urls_cite_once() {
        let mut state = ResearchState::new("topic");
        state.sources_gathered.push(record("https://a.example.com/x", "One"));
        state.sources_gathered.push(record("http://a.example.com/x/", "Dup"));

        let report = finalize(&state, false);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].title, "One");
    }

    #[test]
    fn empty_run_flags_insufficient_sources() {
        let mut state = ResearchState::new("topic");
        state.running_summary = "> **Insufficient sources**: nothing found.".to_string();

        let report = finalize(&state, false);
        assert!(report.insufficient_sources);
        assert!(report.sources.is_empty());
        assert!(!report.summary.contains("### Sources"));
    }

    #[test]
    fn abort_is_visible_in_the_report() {
        let state = ResearchState::new("topic");
        let report = finalize(&state, true);
        assert!(report.aborted);
    }
}

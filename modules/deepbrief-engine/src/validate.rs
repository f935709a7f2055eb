//! Source validation: ledger dedup, relevance scoring, threshold filter.

use std::collections::{HashMap, HashSet};

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use deepbrief_core::{
    normalize_url, EngineError, EngineResult, RubricWeights, SearchHit, SourceRecord,
};
use llm_client::ChatModel;

use crate::prompts::{validation_user_prompt, VALIDATION_SYSTEM};
use crate::state::ResearchState;
use crate::structured::{extract_structured, ExtractError};

/// Per-candidate verdict from the scoring call, keyed by candidate number.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScoredCandidate {
    /// 1-based number of the candidate being scored
    pub candidate: u32,
    /// Topical relevance in [0.0, 1.0]
    pub relevance_score: f32,
    /// One-sentence justification
    pub reason: String,
    /// Academic rubric: the work describes methodology or results in substance
    #[serde(default)]
    pub has_methodology: bool,
    /// Academic rubric: published within roughly the last three years
    #[serde(default)]
    pub is_recent: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ValidationResponse {
    #[serde(default)]
    pub sources: Vec<ScoredCandidate>,
}

/// What a validation round produced.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    /// Scored records that passed the threshold, in candidate order.
    pub records: Vec<SourceRecord>,
    pub duplicates_dropped: u32,
    pub below_threshold: u32,
}

pub struct SourceValidator<'a> {
    model: &'a dyn ChatModel,
    min_score: f32,
    rubric: RubricWeights,
}

impl<'a> SourceValidator<'a> {
    pub fn new(model: &'a dyn ChatModel, min_score: f32, rubric: RubricWeights) -> Self {
        Self {
            model,
            min_score,
            rubric,
        }
    }

    /// Filter and score one batch of candidates against the run state.
    ///
    /// Candidates already in the dedup ledger are dropped before any LLM
    /// call. A scoring parse failure degrades to accepting the remaining
    /// candidates at the threshold score — the retry unit is the whole
    /// query, so individual sources are never retried.
    pub async fn validate(
        &self,
        state: &ResearchState,
        candidates: Vec<SearchHit>,
    ) -> EngineResult<ValidationOutcome> {
        let mut outcome = ValidationOutcome::default();

        // Ledger dedup, plus within-batch dedup for providers overlapping
        // after normalization.
        let mut batch_seen: HashSet<String> = HashSet::new();
        let fresh: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|hit| {
                let key = normalize_url(&hit.url);
                if state.seen_urls.contains(&key) || !batch_seen.insert(key) {
                    outcome.duplicates_dropped += 1;
                    return false;
                }
                true
            })
            .collect();

        if outcome.duplicates_dropped > 0 {
            info!(
                dropped = outcome.duplicates_dropped,
                "Dedup ledger dropped already-seen candidates"
            );
        }

        if fresh.is_empty() {
            return Ok(outcome);
        }

        let scores = self.score(state, &fresh).await?;

        match scores {
            Some(by_index) => {
                for (i, hit) in fresh.into_iter().enumerate() {
                    let Some(verdict) = by_index.get(&(i as u32 + 1)) else {
                        // The model skipped this candidate; without a score
                        // it cannot clear the threshold.
                        outcome.below_threshold += 1;
                        continue;
                    };

                    let base = verdict.relevance_score.clamp(0.0, 1.0);
                    let score = if hit.provider.is_academic() {
                        enhanced_score(
                            base,
                            &self.rubric,
                            verdict.has_methodology,
                            verdict.is_recent,
                        )
                    } else {
                        base
                    };

                    if score >= self.min_score {
                        info!(url = hit.url.as_str(), score, "Source accepted");
                        outcome.records.push(SourceRecord::from_hit(hit, score));
                    } else {
                        info!(
                            url = hit.url.as_str(),
                            score,
                            reason = verdict.reason.as_str(),
                            "Source filtered"
                        );
                        outcome.below_threshold += 1;
                    }
                }
            }
            None => {
                // Scoring unavailable: keep the batch at the threshold score
                // rather than discarding real search results.
                warn!(
                    count = fresh.len(),
                    "Validation scoring failed to parse, accepting candidates at threshold"
                );
                for hit in fresh {
                    outcome
                        .records
                        .push(SourceRecord::from_hit(hit, self.min_score));
                }
            }
        }

        Ok(outcome)
    }

    async fn score(
        &self,
        state: &ResearchState,
        fresh: &[SearchHit],
    ) -> EngineResult<Option<HashMap<u32, ScoredCandidate>>> {
        let user = validation_user_prompt(state, fresh);

        match extract_structured::<ValidationResponse>(
            self.model,
            VALIDATION_SYSTEM,
            &user,
            "score_sources",
            "Score each candidate source for relevance.",
        )
        .await
        {
            Ok(response) if !response.sources.is_empty() => Ok(Some(
                response
                    .sources
                    .into_iter()
                    .map(|s| (s.candidate, s))
                    .collect(),
            )),
            Ok(_) => Ok(None),
            Err(ExtractError::Parse(e)) => {
                warn!(error = %e, "Validation scoring parse failure");
                Ok(None)
            }
            Err(ExtractError::Llm(e)) => Err(EngineError::LlmUnreachable(e)),
        }
    }
}

/// The enhanced academic rubric: deterministic bonuses on top of the generic
/// relevance score. Monotone by construction — the result is never below the
/// clamped generic score.
pub fn enhanced_score(
    base: f32,
    rubric: &RubricWeights,
    has_methodology: bool,
    is_recent: bool,
) -> f32 {
    let mut score = base.clamp(0.0, 1.0);
    if has_methodology {
        score += rubric.methodology_bonus;
    }
    if is_recent {
        score += rubric.recency_bonus;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepbrief_core::{LlmError, ProviderKind};
    use llm_client::ToolSpec;

    struct JsonModel {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for JsonModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }

        async fn complete_json(
            &self,
            _system: &str,
            _user: &str,
            _schema: &serde_json::Value,
        ) -> Result<String, LlmError> {
            Ok(self.reply.clone())
        }

        async fn call_tool(
            &self,
            _system: &str,
            _user: &str,
            _tool: &ToolSpec,
        ) -> Result<serde_json::Value, LlmError> {
            Err(LlmError::NoToolCall)
        }

        fn name(&self) -> &str {
            "json"
        }
    }

    fn hit(url: &str, provider: ProviderKind) -> SearchHit {
        SearchHit::new(url, "title", "content", provider)
    }

    fn verdict(candidate: u32, score: f32) -> String {
        format!(
            r#"{{"candidate": {candidate}, "relevance_score": {score}, "reason": "r", "has_methodology": false, "is_recent": false}}"#
        )
    }

    #[tokio::test]
    async fn threshold_filters_scored_candidates() {
        let model = JsonModel {
            reply: format!(
                r#"{{"sources": [{}, {}, {}]}}"#,
                verdict(1, 0.8),
                verdict(2, 0.3),
                verdict(3, 0.9),
            ),
        };
        let state = ResearchState::new("quantum error correction 2024");
        let validator = SourceValidator::new(&model, 0.5, RubricWeights::default());

        let outcome = validator
            .validate(
                &state,
                vec![
                    hit("https://a.example.com", ProviderKind::Tavily),
                    hit("https://b.example.com", ProviderKind::Tavily),
                    hit("https://c.example.com", ProviderKind::Tavily),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.below_threshold, 1);
        assert_eq!(outcome.records[0].url, "https://a.example.com");
        assert_eq!(outcome.records[1].url, "https://c.example.com");
    }

    #[tokio::test]
    async fn ledger_urls_never_rescored() {
        let model = JsonModel {
            reply: format!(r#"{{"sources": [{}]}}"#, verdict(1, 0.9)),
        };
        let mut state = ResearchState::new("topic");
        state
            .seen_urls
            .insert(normalize_url("https://seen.example.com/page"));
        let validator = SourceValidator::new(&model, 0.5, RubricWeights::default());

        let outcome = validator
            .validate(
                &state,
                vec![
                    // Same document in ledger form and with tracking noise
                    hit(
                        "http://seen.example.com/page/?utm_source=x",
                        ProviderKind::Tavily,
                    ),
                    hit("https://new.example.com", ProviderKind::Tavily),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].url, "https://new.example.com");
    }

    #[tokio::test]
    async fn within_batch_duplicates_collapse() {
        let model = JsonModel {
            reply: format!(r#"{{"sources": [{}]}}"#, verdict(1, 0.9)),
        };
        let state = ResearchState::new("topic");
        let validator = SourceValidator::new(&model, 0.5, RubricWeights::default());

        let outcome = validator
            .validate(
                &state,
                vec![
                    hit("https://dup.example.com", ProviderKind::Tavily),
                    hit("https://dup.example.com/", ProviderKind::Searxng),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn academic_sources_use_enhanced_rubric() {
        let model = JsonModel {
            reply: r#"{"sources": [
                {"candidate": 1, "relevance_score": 0.45, "reason": "r", "has_methodology": true, "is_recent": false}
            ]}"#
            .to_string(),
        };
        let state = ResearchState::new("topic");
        let validator = SourceValidator::new(&model, 0.5, RubricWeights::default());

        // 0.45 generic would fail the 0.5 bar; the methodology bonus clears it
        let outcome = validator
            .validate(&state, vec![hit("https://arxiv.org/abs/1", ProviderKind::Arxiv)])
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.records[0].is_academic);
        assert!((outcome.records[0].relevance_score - 0.55).abs() < 1e-6);
    }

    #[tokio::test]
    async fn scoring_parse_failure_degrades_to_threshold_accept() {
        let model = JsonModel {
            reply: "not json".to_string(),
        };
        let state = ResearchState::new("topic");
        let validator = SourceValidator::new(&model, 0.5, RubricWeights::default());

        let outcome = validator
            .validate(&state, vec![hit("https://a.example.com", ProviderKind::Tavily)])
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].relevance_score, 0.5);
    }

    #[tokio::test]
    async fn unscored_candidates_do_not_pass() {
        let model = JsonModel {
            // Scores only candidate 1 of 2
            reply: format!(r#"{{"sources": [{}]}}"#, verdict(1, 0.9)),
        };
        let state = ResearchState::new("topic");
        let validator = SourceValidator::new(&model, 0.5, RubricWeights::default());

        let outcome = validator
            .validate(
                &state,
                vec![
                    hit("https://a.example.com", ProviderKind::Tavily),
                    hit("https://b.example.com", ProviderKind::Tavily),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.below_threshold, 1);
    }

    #[test]
    fn rubric_is_monotone_over_score_grid() {
        let rubric = RubricWeights::default();
        for i in 0..=20 {
            let base = i as f32 / 20.0;
            for &(m, r) in &[(false, false), (true, false), (false, true), (true, true)] {
                let enhanced = enhanced_score(base, &rubric, m, r);
                assert!(enhanced >= base.clamp(0.0, 1.0), "base {base}, m {m}, r {r}");
                assert!(enhanced <= 1.0);
            }
        }
    }

    #[test]
    fn rubric_clamps_at_one() {
        let rubric = RubricWeights::default();
        assert_eq!(enhanced_score(0.95, &rubric, true, true), 1.0);
        assert_eq!(enhanced_score(1.7, &rubric, false, false), 1.0);
    }
}

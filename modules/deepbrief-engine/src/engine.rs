//! The research iteration controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use deepbrief_core::{normalize_url, EngineResult, ResearchOptions, ResearchReport};
use llm_client::ChatModel;
use search_client::SearchGateway;

use crate::query::QueryGenerator;
use crate::reflect::Reflector;
use crate::report;
use crate::state::{Phase, ResearchState, RunStats};
use crate::summarize::Summarizer;
use crate::validate::SourceValidator;

/// Owns the loop state for one research run and sequences the collaborators:
/// query generation → search fan-out → validation (with bounded retries) →
/// summarization → reflection, then finalization.
pub struct ResearchEngine {
    model: Arc<dyn ChatModel>,
    /// Per-component overrides; fall back to `model`.
    query_model: Option<Arc<dyn ChatModel>>,
    summarizer_model: Option<Arc<dyn ChatModel>>,
    gateway: SearchGateway,
    options: ResearchOptions,
    cancel: Arc<AtomicBool>,
    progress: Option<watch::Sender<String>>,
}

impl std::fmt::Debug for ResearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchEngine").finish_non_exhaustive()
    }
}

impl ResearchEngine {
    /// Options are validated here, at the boundary — never inside the loop.
    pub fn new(
        model: Arc<dyn ChatModel>,
        gateway: SearchGateway,
        options: ResearchOptions,
    ) -> EngineResult<Self> {
        options.validate()?;
        Ok(Self {
            model,
            query_model: None,
            summarizer_model: None,
            gateway,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Use a dedicated model for query generation.
    pub fn with_query_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.query_model = Some(model);
        self
    }

    /// Use a dedicated model for summarization.
    pub fn with_summarizer_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.summarizer_model = Some(model);
        self
    }

    /// Attach a progress channel for an external poller.
    pub fn with_progress(mut self, tx: watch::Sender<String>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Flag honored at loop-iteration boundaries; never preempts an
    /// in-flight LLM or search call, so the running summary stays consistent.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn set_phase(&self, phase: Phase, state: &ResearchState) {
        info!(
            iteration = state.loop_count + 1,
            max_loops = self.options.max_loops,
            phase = %phase,
            "Phase transition"
        );
        if let Some(tx) = &self.progress {
            let _ = tx.send(format!(
                "loop {}/{}: {phase}",
                state.loop_count + 1,
                self.options.max_loops,
            ));
        }
    }

    /// Execute one full research run.
    ///
    /// Always terminates: the outer loop is bounded by `max_loops`, the
    /// inner retry loop by `max_source_retries`, and every collaborator
    /// degrades parse failures to safe defaults. Only an unreachable model
    /// or invalid options surface as errors.
    pub async fn run(&self, topic: &str) -> EngineResult<ResearchReport> {
        let mut state = ResearchState::new(topic);
        let mut stats = RunStats::default();

        let query_gen = QueryGenerator::new(
            self.query_model.as_deref().unwrap_or(self.model.as_ref()),
        );
        let validator = SourceValidator::new(
            self.model.as_ref(),
            self.options.min_source_relevance_score,
            self.options.rubric,
        );
        let summarizer = Summarizer::new(
            self.summarizer_model
                .as_deref()
                .unwrap_or(self.model.as_ref()),
        );
        let reflector = Reflector::new(self.model.as_ref());

        let mut aborted = false;

        while state.loop_count < self.options.max_loops {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Abort requested, stopping at loop boundary");
                aborted = true;
                break;
            }

            state.retry_count_this_loop = 0;
            state.validation_failed_terminal = false;

            self.set_phase(Phase::GeneratingQuery, &state);
            let generated = query_gen.next_query(&state).await?;
            info!(
                query = generated.query.as_str(),
                rationale = generated.rationale.as_str(),
                "Query generated"
            );
            state.record_query(generated.query);
            stats.queries_issued += 1;

            // Search and validate, retrying with refined queries while the
            // filtered list comes back empty and retry budget remains.
            let new_records = loop {
                self.set_phase(Phase::Searching, &state);
                let candidates = self.gateway.search(&state.search_query).await;
                stats.candidates_seen += candidates.len() as u32;

                self.set_phase(Phase::Validating, &state);
                let outcome = validator.validate(&state, candidates).await?;
                stats.duplicates_dropped += outcome.duplicates_dropped;
                stats.below_threshold += outcome.below_threshold;

                if !outcome.records.is_empty() {
                    break outcome.records;
                }
                if state.retry_count_this_loop >= self.options.max_source_retries {
                    warn!(
                        retries = state.retry_count_this_loop,
                        "Validation exhausted, proceeding without sources"
                    );
                    state.validation_failed_terminal = true;
                    break Vec::new();
                }

                state.retry_count_this_loop += 1;
                stats.search_retries += 1;
                let refined = query_gen.refine_after_no_sources(&state).await?;
                info!(
                    query = refined.query.as_str(),
                    attempt = state.retry_count_this_loop,
                    "Retrying with refined query"
                );
                state.record_query(refined.query);
                stats.queries_issued += 1;
            };

            let new_count = new_records.len();
            for record in &new_records {
                state.seen_urls.insert(normalize_url(&record.url));
            }
            state.sources_gathered.extend(new_records);
            stats.sources_kept += new_count as u32;
            if new_count == 0 {
                stats.loops_without_sources += 1;
            }

            self.set_phase(Phase::Summarizing, &state);
            state.running_summary = summarizer.extend(&state, new_count).await?;

            self.set_phase(Phase::Reflecting, &state);
            let reflection = reflector.reflect(&state).await?;
            state.knowledge_gap = reflection.knowledge_gap;

            state.loop_count += 1;
            stats.loops_completed = state.loop_count;

            if self.options.allow_early_exit && reflection.is_sufficient {
                info!(
                    loops = state.loop_count,
                    "Reflector signaled sufficiency, stopping early"
                );
                break;
            }
        }

        self.set_phase(Phase::Finalizing, &state);
        let report = report::finalize(&state, aborted);
        info!("{stats}");
        Ok(report)
    }
}

//! In-process run façade: start a research run in the background, poll its
//! status, abort at a loop boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use deepbrief_core::{EngineError, ResearchReport};

use crate::engine::ResearchEngine;

/// Poll result for one run.
#[derive(Debug, Clone)]
pub enum RunStatus {
    Running { progress: String },
    Completed { report: ResearchReport },
    Failed { error: String },
}

struct RunEntry {
    cancel: Arc<AtomicBool>,
    progress: watch::Receiver<String>,
    outcome: Arc<Mutex<Option<Result<ResearchReport, EngineError>>>>,
}

/// Registry of research runs. Each run is an independent task with its own
/// state; the registry shares nothing between them beyond this map.
#[derive(Default)]
pub struct ResearchRuns {
    runs: Mutex<HashMap<Uuid, RunEntry>>,
}

impl ResearchRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a run and return its handle. The engine is consumed; its
    /// progress channel and cancel flag are wired into the registry.
    pub fn start(&self, engine: ResearchEngine, topic: impl Into<String>) -> Uuid {
        let topic = topic.into();
        let (tx, rx) = watch::channel("starting".to_string());
        let engine = engine.with_progress(tx);
        let cancel = engine.cancel_flag();

        let outcome = Arc::new(Mutex::new(None));
        let task_outcome = outcome.clone();
        tokio::spawn(async move {
            let result = engine.run(&topic).await;
            *task_outcome.lock().expect("run outcome lock") = Some(result);
        });

        let id = Uuid::new_v4();
        self.runs.lock().expect("runs lock").insert(
            id,
            RunEntry {
                cancel,
                progress: rx,
                outcome,
            },
        );
        info!(run_id = %id, "Research run started");
        id
    }

    /// Current status, or `None` for an unknown handle.
    pub fn poll(&self, id: &Uuid) -> Option<RunStatus> {
        let runs = self.runs.lock().expect("runs lock");
        let entry = runs.get(id)?;
        let outcome = entry.outcome.lock().expect("run outcome lock");
        Some(match &*outcome {
            Some(Ok(report)) => RunStatus::Completed {
                report: report.clone(),
            },
            Some(Err(e)) => RunStatus::Failed {
                error: e.to_string(),
            },
            None => RunStatus::Running {
                progress: entry.progress.borrow().clone(),
            },
        })
    }

    /// Request an abort. Honored at the next loop-iteration boundary; the
    /// run then finalizes with whatever it has gathered, flagged as aborted.
    pub fn abort(&self, id: &Uuid) -> bool {
        let runs = self.runs.lock().expect("runs lock");
        match runs.get(id) {
            Some(entry) => {
                entry.cancel.store(true, Ordering::Relaxed);
                info!(run_id = %id, "Abort requested");
                true
            }
            None => false,
        }
    }
}

//! The archivist: question in, narrated answer and tool trace out.
//!
//! Construction is the one-time initialisation step. The entity vocabulary
//! is snapshotted from the store, the corrector and orchestrator are built,
//! and the admission gate is sized. Nothing is mutated afterwards.

use crate::config::ArchivistConfig;
use crate::corrector::NameCorrector;
use crate::engine::CompletionEngine;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::pool::{PoolError, WorkerPool};
use crate::store::{Collection, RecordStore, StoreError};
use crate::trace::{extract_trace, ToolInvocationRecord};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors from [`Archivist::ask`].
#[derive(Debug, Error)]
pub enum AskError {
    #[error("The question cannot be empty")]
    EmptyQuestion,

    #[error("The archivist ran into an error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("The archivist ran into an error: {0}")]
    Worker(#[from] PoolError),
}

impl AskError {
    /// Whether the caller sent a bad request, as opposed to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AskError::EmptyQuestion)
    }
}

/// Answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub steps: Vec<ToolInvocationRecord>,
    /// Wall-clock seconds, rounded to one decimal.
    pub elapsed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_question: Option<String>,
}

/// Record counts per collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub events_count: usize,
    pub entities_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Online,
    Error,
}

/// Liveness report. A store failure degrades the status, it is not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StoreStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthReport {
    /// A degraded report carrying the reason.
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            stats: None,
            detail: Some(detail.into()),
        }
    }
}

/// Campaign question answering over a record store.
pub struct Archivist {
    corrector: NameCorrector,
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn RecordStore>,
    pool: WorkerPool,
}

impl Archivist {
    /// Snapshot the entity vocabulary and assemble the pipeline.
    pub async fn new(
        config: ArchivistConfig,
        engine: Arc<dyn CompletionEngine>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, StoreError> {
        let vocabulary: Vec<String> = store
            .exact_get(Collection::Entities, None)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();

        tracing::info!(
            names = vocabulary.len(),
            concurrency = config.concurrency,
            max_steps = config.max_steps,
            "Archivist ready"
        );

        let mut corrector = NameCorrector::new(engine.clone(), vocabulary);
        if let Some(ref model) = config.model {
            corrector = corrector.with_model(model);
        }

        Ok(Self {
            corrector,
            orchestrator: Arc::new(Orchestrator::new(engine, store.clone(), &config)),
            store,
            pool: WorkerPool::new(config.concurrency),
        })
    }

    pub fn corrector(&self) -> &NameCorrector {
        &self.corrector
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Answer a question.
    ///
    /// The question is trimmed and rejected if empty, names are corrected,
    /// then the run waits for a worker slot.
    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let start = Instant::now();

        let corrected = self.corrector.correct(question).await;
        let was_corrected = corrected != question;

        let orchestrator = self.orchestrator.clone();
        let prompt = corrected.clone();
        let run = self
            .pool
            .submit(async move { orchestrator.run(&prompt).await })
            .await??;

        let elapsed = (start.elapsed().as_secs_f64() * 10.0).round() / 10.0;
        let trace = extract_trace(run.transcript.entries());

        tracing::info!(
            steps = run.steps,
            tools = trace.records.len(),
            elapsed,
            "Question answered"
        );

        Ok(Answer {
            answer: trace.final_answer,
            steps: trace.records,
            elapsed,
            original_question: was_corrected.then(|| question.to_string()),
            corrected_question: was_corrected.then_some(corrected),
        })
    }

    /// Report liveness and record counts.
    pub async fn health(&self) -> HealthReport {
        store_health(self.store.as_ref()).await
    }
}

/// Liveness of a store on its own, without a completion engine.
pub async fn store_health(store: &dyn RecordStore) -> HealthReport {
    match store_stats(store).await {
        Ok(stats) => HealthReport {
            status: HealthStatus::Online,
            stats: Some(stats),
            detail: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the store");
            HealthReport::error(e.to_string())
        }
    }
}

async fn store_stats(store: &dyn RecordStore) -> Result<StoreStats, StoreError> {
    Ok(StoreStats {
        events_count: store.count(Collection::Events).await?,
        entities_count: store.count(Collection::Entities).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_error_classification() {
        assert!(AskError::EmptyQuestion.is_client_error());
        let err = AskError::from(OrchestratorError::StepLimitExceeded { max_steps: 15 });
        assert!(!err.is_client_error());
        assert!(!AskError::from(PoolError::Closed).is_client_error());
    }

    #[test]
    fn test_answer_omits_absent_questions() {
        let answer = Answer {
            answer: "I recall...".to_string(),
            steps: vec![],
            elapsed: 1.2,
            original_question: None,
            corrected_question: None,
        };
        let value = serde_json::to_value(&answer).unwrap();
        assert_eq!(
            value,
            json!({"answer": "I recall...", "steps": [], "elapsed": 1.2})
        );
    }

    #[tokio::test]
    async fn test_store_health_needs_no_engine() {
        let store = crate::testing::sample_store().await.unwrap();
        let report = store_health(store.as_ref()).await;
        assert_eq!(report.status, HealthStatus::Online);
        assert_eq!(
            report.stats,
            Some(StoreStats {
                events_count: 6,
                entities_count: 5,
            })
        );

        let report = store_health(&crate::testing::UnreachableStore).await;
        assert_eq!(report, HealthReport::error("Record store unavailable: connection refused"));
    }

    #[test]
    fn test_health_report_shape() {
        let report = HealthReport {
            status: HealthStatus::Online,
            stats: Some(StoreStats {
                events_count: 3,
                entities_count: 2,
            }),
            detail: None,
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"status": "online", "stats": {"events_count": 3, "entities_count": 2}})
        );
    }
}

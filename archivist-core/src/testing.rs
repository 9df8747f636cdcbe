//! Testing utilities for the archivist.
//!
//! This module provides tools for integration testing:
//! - `ScriptedEngine` for deterministic runs without API calls
//! - `UnreachableStore` and `FlakyStore` for store failure paths
//! - sample campaign fixtures

use crate::engine::CompletionEngine;
use crate::store::{
    CampaignSnapshot, Collection, HashingEmbedder, MemoryStore, MetadataFilter, Record,
    RecordStore, ScoredRecord, StoreError,
};
use async_trait::async_trait;
use claude::{ContentBlock, Request, Response, StopReason, Usage};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One scripted reply to a tool-enabled request.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Ask for these tool calls, in order.
    ToolCalls(Vec<(String, Value)>),
    /// Answer with this text.
    Answer(String),
    /// Fail the completion call.
    Fail(String),
}

impl ScriptedTurn {
    /// A turn with a single tool call.
    pub fn call(name: impl Into<String>, input: Value) -> Self {
        ScriptedTurn::ToolCalls(vec![(name.into(), input)])
    }

    pub fn answer(text: impl Into<String>) -> Self {
        ScriptedTurn::Answer(text.into())
    }
}

/// A completion engine that replays scripted responses.
///
/// Requests without tools are treated as name corrections: the question is
/// echoed back with the configured replacements applied. Requests with tools
/// consume the scripted turns in order; once they run out, every request is
/// answered with the default answer.
pub struct ScriptedEngine {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    corrections: Vec<(String, String)>,
    failing_correction: bool,
    default_answer: String,
    latency: Option<Duration>,
    requests: Mutex<Vec<Request>>,
    calls: AtomicUsize,
    tool_ids: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            corrections: Vec::new(),
            failing_correction: false,
            default_answer: "The chronicles are silent on this matter...".to_string(),
            latency: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            tool_ids: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Queue turns for tool-enabled requests.
    pub fn with_turns(mut self, turns: Vec<ScriptedTurn>) -> Self {
        self.turns.get_mut().extend(turns);
        self
    }

    /// Replace `from` with `to` when correcting names.
    pub fn with_correction(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.corrections.push((from.into(), to.into()));
        self
    }

    /// Make every name correction call fail.
    pub fn with_failing_correction(mut self) -> Self {
        self.failing_correction = true;
        self
    }

    pub fn with_default_answer(mut self, answer: impl Into<String>) -> Self {
        self.default_answer = answer.into();
        self
    }

    /// Delay every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every request received, in arrival order.
    pub async fn requests(&self) -> Vec<Request> {
        self.requests.lock().await.clone()
    }

    /// Number of completion calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of tool-enabled calls in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn correction(&self, request: &Request) -> Result<Response, claude::Error> {
        if self.failing_correction {
            return Err(claude::Error::Network("scripted correction failure".to_string()));
        }
        let question = request
            .messages
            .last()
            .map(|m| {
                m.content
                    .iter()
                    .filter_map(ContentBlock::as_text)
                    .collect::<String>()
            })
            .unwrap_or_default();
        let corrected = self
            .corrections
            .iter()
            .fold(question, |text, (from, to)| text.replace(from.as_str(), to));
        Ok(response(vec![ContentBlock::Text { text: corrected }], StopReason::EndTurn))
    }

    async fn next_turn(&self) -> Result<Response, claude::Error> {
        let turn = self.turns.lock().await.pop_front();
        match turn {
            Some(ScriptedTurn::ToolCalls(calls)) => {
                let content = calls
                    .into_iter()
                    .map(|(name, input)| ContentBlock::ToolUse {
                        id: format!("toolu_{:02}", self.tool_ids.fetch_add(1, Ordering::SeqCst)),
                        name,
                        input,
                    })
                    .collect();
                Ok(response(content, StopReason::ToolUse))
            }
            Some(ScriptedTurn::Answer(text)) => Ok(response(
                vec![ContentBlock::Text { text }],
                StopReason::EndTurn,
            )),
            Some(ScriptedTurn::Fail(message)) => Err(claude::Error::Api {
                status: 500,
                message,
            }),
            None => Ok(response(
                vec![ContentBlock::Text {
                    text: self.default_answer.clone(),
                }],
                StopReason::EndTurn,
            )),
        }
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn complete(&self, request: Request) -> Result<Response, claude::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());

        if request.tools.is_none() {
            return self.correction(&request);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.next_turn().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn response(content: Vec<ContentBlock>, stop_reason: StopReason) -> Response {
    Response {
        id: "msg_scripted".to_string(),
        model: "scripted".to_string(),
        content,
        stop_reason,
        usage: Usage::default(),
    }
}

/// A store whose every query fails.
pub struct UnreachableStore;

#[async_trait]
impl RecordStore for UnreachableStore {
    async fn semantic_query(
        &self,
        _collection: Collection,
        _text: &str,
        _top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        Err(unreachable_error())
    }

    async fn exact_get(
        &self,
        _collection: Collection,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        Err(unreachable_error())
    }

    async fn count(&self, _collection: Collection) -> Result<usize, StoreError> {
        Err(unreachable_error())
    }
}

fn unreachable_error() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

/// Wraps a store and can be switched to fail every query, to simulate an
/// outage after startup.
pub struct FlakyStore {
    inner: Arc<dyn RecordStore>,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    /// Fail every query from now on.
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(unreachable_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn semantic_query(
        &self,
        collection: Collection,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        self.check()?;
        self.inner.semantic_query(collection, text, top_k).await
    }

    async fn exact_get(
        &self,
        collection: Collection,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        self.check()?;
        self.inner.exact_get(collection, filter).await
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.count(collection).await
    }
}

fn event(
    id: &str,
    session: u32,
    order: u32,
    event_type: &str,
    entities: &str,
    document: &str,
) -> Record {
    record(
        id,
        document,
        json!({
            "session": session,
            "order": order,
            "event_type": event_type,
            "entities": entities,
        }),
    )
}

fn entity(
    name: &str,
    entity_type: &str,
    status: &str,
    sessions: (u32, u32),
    document: &str,
) -> Record {
    record(
        name,
        document,
        json!({
            "type": entity_type,
            "status": status,
            "first_session": sessions.0,
            "last_session": sessions.1,
        }),
    )
}

fn record(id: &str, document: &str, metadata: Value) -> Record {
    Record {
        id: id.to_string(),
        document: document.to_string(),
        metadata: match metadata {
            Value::Object(map) => map,
            _ => Default::default(),
        },
    }
}

/// A small three-session campaign. Events are stored out of order.
pub fn sample_snapshot() -> CampaignSnapshot {
    CampaignSnapshot {
        events: vec![
            event(
                "s2-e1",
                2,
                1,
                "combat",
                "Imoen, Thalantyr",
                "Bandits attack the tower of High Hedge; Thalantyr drives them off with fire.",
            ),
            event(
                "s1-e2",
                1,
                2,
                "death",
                "Gorion,Imoen",
                "Gorion falls to an armoured stranger on the road out of Candlekeep.",
            ),
            event(
                "s1-e0",
                1,
                0,
                "departure",
                "Gorion, Imoen",
                "Gorion and Imoen leave Candlekeep at nightfall.",
            ),
            event(
                "s3-e0",
                3,
                0,
                "travel",
                "Imoen, Beregost",
                "The party reaches Beregost and rests at the Feldpost Inn.",
            ),
            event(
                "s2-e0",
                2,
                0,
                "meeting",
                "  thalantyr , Imoen",
                "Imoen meets the wizard Thalantyr at High Hedge and trades for scrolls.",
            ),
            event(
                "s1-e1",
                1,
                1,
                "omen",
                "Gorion",
                "Gorion warns of danger and urges haste.",
            ),
        ],
        entities: vec![
            entity(
                "Thalantyr",
                "character",
                "alive",
                (2, 2),
                "A reclusive conjurer who lives at High Hedge and sells scrolls to trusted travellers.",
            ),
            entity(
                "Imoen",
                "character",
                "alive",
                (1, 3),
                "A cheerful thief raised in Candlekeep, childhood friend of the hero.",
            ),
            entity(
                "Gorion",
                "character",
                "dead",
                (1, 1),
                "The hero's foster father, a sage of Candlekeep.",
            ),
            entity(
                "Beregost",
                "place",
                "visited",
                (3, 3),
                "A busy town on the Coast Way, known for the Feldpost Inn.",
            ),
            entity(
                "Candlekeep",
                "place",
                "left behind",
                (1, 1),
                "A fortress library perched on a cliff.",
            ),
        ],
    }
}

/// The sample campaign behind the offline embedder.
pub async fn sample_store() -> Result<Arc<MemoryStore>, StoreError> {
    let store =
        MemoryStore::from_snapshot(sample_snapshot(), Arc::new(HashingEmbedder::new())).await?;
    Ok(Arc::new(store))
}

/// A store with no records at all.
pub async fn empty_store() -> Result<Arc<MemoryStore>, StoreError> {
    let store =
        MemoryStore::from_snapshot(CampaignSnapshot::default(), Arc::new(HashingEmbedder::new()))
            .await?;
    Ok(Arc::new(store))
}

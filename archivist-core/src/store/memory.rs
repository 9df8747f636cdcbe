//! In-memory record store loaded from a JSON campaign snapshot.

use super::embedding::cosine_distance;
use super::{
    Collection, Embedder, Entity, Event, MetadataFilter, Record, RecordStore, ScoredRecord,
    StoreError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// On-disk shape of a campaign archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    #[serde(default)]
    pub events: Vec<Record>,
    #[serde(default)]
    pub entities: Vec<Record>,
}

struct Indexed {
    record: Record,
    embedding: Vec<f32>,
}

/// A [`RecordStore`] held entirely in memory.
///
/// Documents are embedded once at load time; queries embed only the query text.
pub struct MemoryStore {
    events: Vec<Indexed>,
    entities: Vec<Indexed>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryStore {
    /// Validate and index a snapshot.
    ///
    /// Every event must carry integer `session`/`order` and string
    /// `event_type`/`entities`; `(session, order)` pairs are unique. Entity
    /// identifiers are unique ignoring case.
    pub async fn from_snapshot(
        snapshot: CampaignSnapshot,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        let mut orders = HashSet::new();
        for record in &snapshot.events {
            let event = Event::from_record(record)?;
            if !orders.insert((event.session, event.order)) {
                return Err(StoreError::DuplicateEventOrder {
                    session: event.session,
                    order: event.order,
                });
            }
        }

        let mut names = HashSet::new();
        for record in &snapshot.entities {
            let entity = Entity::from_record(record)?;
            if !names.insert(entity.name.trim().to_lowercase()) {
                return Err(StoreError::DuplicateEntity { name: entity.name });
            }
        }

        let events = index(snapshot.events, embedder.as_ref()).await?;
        let entities = index(snapshot.entities, embedder.as_ref()).await?;

        tracing::info!(
            events = events.len(),
            entities = entities.len(),
            embedder = embedder.model_name(),
            "Campaign archive loaded"
        );

        Ok(Self {
            events,
            entities,
            embedder,
        })
    }

    /// Read a snapshot file and index it.
    pub async fn open(
        path: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Reading campaign snapshot");
        let raw = tokio::fs::read_to_string(path).await?;
        let snapshot: CampaignSnapshot = serde_json::from_str(&raw)?;
        Self::from_snapshot(snapshot, embedder).await
    }

    fn collection(&self, collection: Collection) -> &[Indexed] {
        match collection {
            Collection::Events => &self.events,
            Collection::Entities => &self.entities,
        }
    }
}

async fn index(records: Vec<Record>, embedder: &dyn Embedder) -> Result<Vec<Indexed>, StoreError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let documents: Vec<String> = records.iter().map(|r| r.document.clone()).collect();
    let embeddings = embedder.embed(&documents).await?;
    if embeddings.len() != records.len() {
        return Err(StoreError::Embedding(format!(
            "Expected {} embeddings, got {}",
            records.len(),
            embeddings.len()
        )));
    }
    Ok(records
        .into_iter()
        .zip(embeddings)
        .map(|(record, embedding)| Indexed { record, embedding })
        .collect())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn semantic_query(
        &self,
        collection: Collection,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let items = self.collection(collection);
        if items.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Embedding("No embedding returned for query".to_string()))?;

        let mut scored: Vec<ScoredRecord> = items
            .iter()
            .map(|item| ScoredRecord {
                record: item.record.clone(),
                distance: cosine_distance(&query, &item.embedding),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(top_k);

        tracing::debug!(%collection, hits = scored.len(), "Semantic query");
        Ok(scored)
    }

    async fn exact_get(
        &self,
        collection: Collection,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .collection(collection)
            .iter()
            .filter(|item| filter.map_or(true, |f| f.matches(&item.record.metadata)))
            .map(|item| item.record.clone())
            .collect())
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        Ok(self.collection(collection).len())
    }
}

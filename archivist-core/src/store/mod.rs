//! Campaign record store.
//!
//! Two read-only collections, events and entities, queried by meaning
//! (nearest neighbour over embeddings), by metadata filter, or enumerated in
//! full. The core only ever reads; records are loaded once at startup.

mod embedding;
mod memory;

pub use embedding::{Embedder, HashingEmbedder, HttpEmbedder};
pub use memory::{CampaignSnapshot, MemoryStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Free-form metadata attached to a record.
pub type Metadata = serde_json::Map<String, Value>;

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed record '{id}': {reason}")]
    Malformed { id: String, reason: String },

    #[error("Session {session} has two events with order {order}")]
    DuplicateEventOrder { session: u32, order: u32 },

    #[error("Entity '{name}' is defined more than once")]
    DuplicateEntity { name: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid campaign snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// The two collections of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Events,
    Entities,
}

impl Collection {
    /// Collection name as the backing store knows it.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Events => "events",
            Collection::Entities => "entities",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored record: identifier, document body and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub document: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A semantic search hit. Lower distance means closer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: Record,
    pub distance: f32,
}

/// Exact metadata filter for [`RecordStore::exact_get`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Equals { key: String, value: Value },
}

impl MetadataFilter {
    /// Match records whose `key` equals `value`.
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        MetadataFilter::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            MetadataFilter::Equals { key, value } => metadata.get(key) == Some(value),
        }
    }
}

/// Read interface over the campaign archive.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Nearest-neighbour search by free text, closest first, at most `top_k` hits.
    async fn semantic_query(
        &self,
        collection: Collection,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Every record matching `filter`, or the whole collection when `None`.
    async fn exact_get(
        &self,
        collection: Collection,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Number of records in the collection.
    async fn count(&self, collection: Collection) -> Result<usize, StoreError>;
}

/// A discrete occurrence within a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub session: u32,
    pub order: u32,
    pub event_type: String,
    /// Comma-separated names of the entities involved.
    pub entities: String,
    pub document: String,
}

impl Event {
    pub fn from_record(record: &Record) -> Result<Self, StoreError> {
        Ok(Self {
            id: record.id.clone(),
            session: meta_positive(record, "session")?,
            order: meta_u32(record, "order")?,
            event_type: meta_str(record, "event_type")?,
            entities: meta_str(record, "entities")?,
            document: record.document.clone(),
        })
    }

    /// Entity names of this event, trimmed and lowercased.
    pub fn entity_names(&self) -> impl Iterator<Item = String> + '_ {
        self.entities
            .split(',')
            .map(|name| name.trim().to_lowercase())
    }

    /// Case-insensitive membership of `name` in the entity list.
    pub fn involves(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.entity_names().any(|n| n == wanted)
    }
}

/// A named persistent subject: character, place, object, faction or quest.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Canonical name, also the record identifier.
    pub name: String,
    pub entity_type: String,
    pub status: String,
    pub first_session: u32,
    pub last_session: u32,
    /// The entity card.
    pub document: String,
}

impl Entity {
    pub fn from_record(record: &Record) -> Result<Self, StoreError> {
        Ok(Self {
            name: record.id.clone(),
            entity_type: meta_str(record, "type")?,
            status: meta_str(record, "status")?,
            first_session: meta_u32(record, "first_session")?,
            last_session: meta_u32(record, "last_session")?,
            document: record.document.clone(),
        })
    }

    /// Case-insensitive identifier comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

fn meta_u32(record: &Record, key: &str) -> Result<u32, StoreError> {
    let value = record.metadata.get(key).ok_or_else(|| missing(record, key))?;
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| StoreError::Malformed {
            id: record.id.clone(),
            reason: format!("'{key}' must be a non-negative integer, got {value}"),
        })
}

fn meta_positive(record: &Record, key: &str) -> Result<u32, StoreError> {
    match meta_u32(record, key)? {
        0 => Err(StoreError::Malformed {
            id: record.id.clone(),
            reason: format!("'{key}' must be a positive integer, got 0"),
        }),
        n => Ok(n),
    }
}

fn meta_str(record: &Record, key: &str) -> Result<String, StoreError> {
    match record.metadata.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(StoreError::Malformed {
            id: record.id.clone(),
            reason: format!("'{key}' must be a string, got {other}"),
        }),
        None => Err(missing(record, key)),
    }
}

fn missing(record: &Record, key: &str) -> StoreError {
    StoreError::Malformed {
        id: record.id.clone(),
        reason: format!("missing '{key}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, metadata: Value) -> Record {
        Record {
            id: id.to_string(),
            document: "body".to_string(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_event_parses_metadata() {
        let event = Event::from_record(&record(
            "e1",
            json!({"session": 2, "order": 0, "event_type": "combat", "entities": "Imoen, Thalantyr"}),
        ))
        .unwrap();
        assert_eq!(event.session, 2);
        assert_eq!(event.order, 0);
        assert!(event.involves("thalantyr"));
        assert!(event.involves("  IMOEN "));
        assert!(!event.involves("Thalant"));
    }

    #[test]
    fn test_event_rejects_negative_order() {
        let err = Event::from_record(&record(
            "e1",
            json!({"session": 1, "order": -1, "event_type": "x", "entities": ""}),
        ))
        .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn test_event_rejects_session_zero() {
        let err = Event::from_record(&record(
            "e0",
            json!({"session": 0, "order": 0, "event_type": "prologue", "entities": "Gorion"}),
        ))
        .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref id, .. } if id == "e0"));
        assert!(err.to_string().contains("'session' must be a positive integer"));
    }

    #[test]
    fn test_entity_missing_status_is_malformed() {
        let err = Entity::from_record(&record(
            "Beregost",
            json!({"type": "place", "first_session": 1, "last_session": 2}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("missing 'status'"));
    }

    #[test]
    fn test_metadata_filter_matches_integers() {
        let filter = MetadataFilter::eq("session", 3);
        assert!(filter.matches(&record("e", json!({"session": 3})).metadata));
        assert!(!filter.matches(&record("e", json!({"session": 4})).metadata));
        assert!(!filter.matches(&record("e", json!({})).metadata));
    }
}

//! Retrieval tools for the archivist.
//!
//! Six read-only queries over the campaign archive. Each renders a plain text
//! block meant to be read by the model, not parsed by a machine.

use crate::store::{Collection, Entity, Event, MetadataFilter, RecordStore, StoreError};
use archivist_macros::Tool;
use claude::Tool;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Maximum hits returned by `search_events`.
const EVENT_HITS: usize = 8;

/// Maximum hits returned by `search_entities`.
const ENTITY_HITS: usize = 5;

/// Semantic search over campaign events. Use it to find events related to a subject, a place, a character or an action. To filter by session, prefer get_session_timeline.
#[derive(Tool, Debug, Clone, PartialEq, Deserialize)]
#[tool(name = "search_events")]
pub struct SearchEvents {
    /// Search terms in natural language.
    pub query: String,
}

/// Semantic search over campaign entities (characters, places, objects, factions, quests). For a specific entity whose name you know, prefer get_entity_card.
#[derive(Tool, Debug, Clone, PartialEq, Deserialize)]
#[tool(name = "search_entities")]
pub struct SearchEntities {
    /// Search terms in natural language.
    pub query: String,
}

/// Fetch the full card of an entity by its exact name. Use it when the user asks about a specific named entity ("Who is Thalantyr?", "Tell me about Beregost"). Matching ignores case. If the exact name is unknown, use search_entities first to find the canonical name.
#[derive(Tool, Debug, Clone, PartialEq, Deserialize)]
#[tool(name = "get_entity_card")]
pub struct GetEntityCard {
    /// Exact name of the entity.
    pub entity_name: String,
}

/// Fetch every event of one session in chronological order. Use it when the user asks what happened during a specific session ("Tell me about session 2").
#[derive(Tool, Debug, Clone, PartialEq, Deserialize)]
#[tool(name = "get_session_timeline")]
pub struct GetSessionTimeline {
    /// Session number (1, 2, 3, ...).
    #[tool(minimum = 1)]
    pub session_number: u32,
}

/// Fetch every event involving a given entity, across all sessions. Use it to rebuild the history of a character, a place or an object.
#[derive(Tool, Debug, Clone, PartialEq, Deserialize)]
#[tool(name = "get_entity_events")]
pub struct GetEntityEvents {
    /// Name of the entity.
    pub entity_name: String,
}

/// Overview of the campaign: number of sessions, events and entities, and the entities grouped by type. Use it for general questions ("Summarise the campaign", "Which characters are in play?").
#[derive(Tool, Debug, Clone, PartialEq, Deserialize)]
#[tool(name = "get_campaign_overview")]
pub struct GetCampaignOverview {}

/// The fixed registry of tools offered to the model.
pub struct CampaignTools;

impl CampaignTools {
    /// Get all tool definitions for the Claude API.
    pub fn all() -> Vec<Tool> {
        vec![
            SearchEvents::as_tool(),
            SearchEntities::as_tool(),
            GetEntityCard::as_tool(),
            GetSessionTimeline::as_tool(),
            GetEntityEvents::as_tool(),
            GetCampaignOverview::as_tool(),
        ]
    }
}

/// A tool call the model asked for that cannot be dispatched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    Unknown { name: String },

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// A parsed, strongly-typed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SearchEvents(SearchEvents),
    SearchEntities(SearchEntities),
    GetEntityCard(GetEntityCard),
    GetSessionTimeline(GetSessionTimeline),
    GetEntityEvents(GetEntityEvents),
    GetCampaignOverview(GetCampaignOverview),
}

impl ToolCall {
    /// Look up `name` in the registry and decode its arguments.
    ///
    /// A `null` input is treated as an empty object.
    pub fn parse(name: &str, input: &Value) -> Result<Self, ToolError> {
        let input = match input {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        match name {
            SearchEvents::NAME => decode(name, input).map(ToolCall::SearchEvents),
            SearchEntities::NAME => decode(name, input).map(ToolCall::SearchEntities),
            GetEntityCard::NAME => decode(name, input).map(ToolCall::GetEntityCard),
            GetSessionTimeline::NAME => decode(name, input).map(ToolCall::GetSessionTimeline),
            GetEntityEvents::NAME => decode(name, input).map(ToolCall::GetEntityEvents),
            GetCampaignOverview::NAME => decode(name, input).map(ToolCall::GetCampaignOverview),
            _ => Err(ToolError::Unknown {
                name: name.to_string(),
            }),
        }
    }

    /// Registry name of this call.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::SearchEvents(_) => SearchEvents::NAME,
            ToolCall::SearchEntities(_) => SearchEntities::NAME,
            ToolCall::GetEntityCard(_) => GetEntityCard::NAME,
            ToolCall::GetSessionTimeline(_) => GetSessionTimeline::NAME,
            ToolCall::GetEntityEvents(_) => GetEntityEvents::NAME,
            ToolCall::GetCampaignOverview(_) => GetCampaignOverview::NAME,
        }
    }

    /// Run the query against the store.
    ///
    /// Store failures propagate; there is no fallback at this layer.
    pub async fn execute(&self, store: &dyn RecordStore) -> Result<String, StoreError> {
        match self {
            ToolCall::SearchEvents(args) => search_events(store, &args.query).await,
            ToolCall::SearchEntities(args) => search_entities(store, &args.query).await,
            ToolCall::GetEntityCard(args) => get_entity_card(store, &args.entity_name).await,
            ToolCall::GetSessionTimeline(args) => {
                get_session_timeline(store, args.session_number).await
            }
            ToolCall::GetEntityEvents(args) => get_entity_events(store, &args.entity_name).await,
            ToolCall::GetCampaignOverview(_) => get_campaign_overview(store).await,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(tool: &str, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

pub async fn search_events(store: &dyn RecordStore, query: &str) -> Result<String, StoreError> {
    let count = store.count(Collection::Events).await?;
    if count == 0 {
        return Ok("No events in the archive.".to_string());
    }

    let hits = store
        .semantic_query(Collection::Events, query, EVENT_HITS.min(count))
        .await?;
    if hits.is_empty() {
        return Ok("No events found for this search.".to_string());
    }

    let mut blocks = Vec::with_capacity(hits.len());
    for hit in &hits {
        let event = Event::from_record(&hit.record)?;
        // Assumes a distance bounded in [0, 1], true for cosine over the
        // non-negative vectors the hashing embedder produces.
        let relevance = 1.0 - hit.distance;
        blocks.push(format!(
            "[Session {}, event {}] ({}) {}\n  Entities involved: {}\n  Relevance: {:.2}",
            event.session, event.order, event.event_type, event.document, event.entities, relevance
        ));
    }
    Ok(blocks.join("\n\n"))
}

pub async fn search_entities(store: &dyn RecordStore, query: &str) -> Result<String, StoreError> {
    let count = store.count(Collection::Entities).await?;
    if count == 0 {
        return Ok("No entities in the archive.".to_string());
    }

    let hits = store
        .semantic_query(Collection::Entities, query, ENTITY_HITS.min(count))
        .await?;
    if hits.is_empty() {
        return Ok("No entities found for this search.".to_string());
    }

    let mut blocks = Vec::with_capacity(hits.len());
    for hit in &hits {
        let entity = Entity::from_record(&hit.record)?;
        blocks.push(format!(
            "[{}] (type: {}, status: {}, sessions: {}-{})\n  {}",
            entity.name,
            entity.entity_type,
            entity.status,
            entity.first_session,
            entity.last_session,
            entity.document
        ));
    }
    Ok(blocks.join("\n\n"))
}

pub async fn get_entity_card(
    store: &dyn RecordStore,
    entity_name: &str,
) -> Result<String, StoreError> {
    for record in store.exact_get(Collection::Entities, None).await? {
        let entity = Entity::from_record(&record)?;
        if entity.is_named(entity_name) {
            return Ok(format!(
                "Entity: {}\nType: {}\nStatus: {}\nPresent from session {} to session {}\n\nCard:\n{}",
                entity.name,
                entity.entity_type,
                entity.status,
                entity.first_session,
                entity.last_session,
                entity.document
            ));
        }
    }

    Ok(format!(
        "No entity found with the exact name '{entity_name}'. \
         Try search_entities for an approximate search."
    ))
}

pub async fn get_session_timeline(
    store: &dyn RecordStore,
    session_number: u32,
) -> Result<String, StoreError> {
    let filter = MetadataFilter::eq("session", session_number);
    let records = store.exact_get(Collection::Events, Some(&filter)).await?;
    if records.is_empty() {
        return Ok(format!("No events found for session {session_number}."));
    }

    let mut events = records
        .iter()
        .map(Event::from_record)
        .collect::<Result<Vec<_>, _>>()?;
    events.sort_by_key(|e| e.order);

    let mut lines = vec![format!(
        "Session {session_number}: {} events:",
        events.len()
    )];
    for event in &events {
        lines.push(format!(
            "  {}. ({}) {}\n     Entities: {}",
            event.order, event.event_type, event.document, event.entities
        ));
    }
    Ok(lines.join("\n\n"))
}

pub async fn get_entity_events(
    store: &dyn RecordStore,
    entity_name: &str,
) -> Result<String, StoreError> {
    let records = store.exact_get(Collection::Events, None).await?;
    if records.is_empty() {
        return Ok("No events in the archive.".to_string());
    }

    let mut matches = Vec::new();
    for record in &records {
        let event = Event::from_record(record)?;
        if event.involves(entity_name) {
            matches.push(event);
        }
    }

    if matches.is_empty() {
        return Ok(format!(
            "No events involve '{entity_name}'. Check the exact name with search_entities."
        ));
    }

    matches.sort_by_key(|e| (e.session, e.order));

    let mut lines = vec![format!(
        "Events involving '{entity_name}' ({} results):",
        matches.len()
    )];
    for event in &matches {
        lines.push(format!(
            "  [S{}.{}] ({}) {}",
            event.session, event.order, event.event_type, event.document
        ));
    }
    Ok(lines.join("\n\n"))
}

pub async fn get_campaign_overview(store: &dyn RecordStore) -> Result<String, StoreError> {
    let event_count = store.count(Collection::Events).await?;
    let entity_count = store.count(Collection::Entities).await?;

    let mut sessions = BTreeSet::new();
    for record in store.exact_get(Collection::Events, None).await? {
        sessions.insert(Event::from_record(&record)?.session);
    }

    let mut by_type: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in store.exact_get(Collection::Entities, None).await? {
        let entity = Entity::from_record(&record)?;
        by_type
            .entry(entity.entity_type)
            .or_default()
            .push(format!("{} ({})", entity.name, entity.status));
    }

    let sessions: Vec<u32> = sessions.into_iter().collect();
    let mut lines = vec![
        format!(
            "Campaign: {} session(s), {event_count} events, {entity_count} entities.",
            sessions.len()
        ),
        format!("Recorded sessions: {sessions:?}"),
        String::new(),
        "Entities by type:".to_string(),
    ];
    for (entity_type, entries) in &by_type {
        lines.push(format!("  {entity_type}: {}", entries.join(", ")));
    }
    Ok(lines.join("\n"))
}

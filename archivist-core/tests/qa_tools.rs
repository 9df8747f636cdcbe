//! QA tests for the retrieval tools against the sample campaign.
//!
//! These tests verify the rendering and ordering rules of each tool:
//! - Chronological session timelines
//! - Case-insensitive entity matching
//! - Sentinels on empty archives
//!
//! Run with: `cargo test -p archivist-core --test qa_tools`

use archivist_core::testing::{empty_store, sample_store, UnreachableStore};
use archivist_core::tools::{
    get_campaign_overview, get_entity_card, get_entity_events, get_session_timeline,
    search_entities, search_events, ToolCall,
};
use archivist_core::StoreError;
use serde_json::json;

// =============================================================================
// SESSION TIMELINE
// =============================================================================

#[tokio::test]
async fn test_session_timeline_is_chronological() {
    let store = sample_store().await.unwrap();
    let text = get_session_timeline(store.as_ref(), 1).await.unwrap();

    assert!(text.starts_with("Session 1: 3 events:"));
    let first = text.find("  0. (departure)").unwrap();
    let second = text.find("  1. (omen)").unwrap();
    let third = text.find("  2. (death)").unwrap();
    assert!(first < second && second < third);

    // Nothing from other sessions
    assert!(!text.contains("Thalantyr"));
    assert!(!text.contains("Beregost"));
}

#[tokio::test]
async fn test_session_timeline_unknown_session() {
    let store = sample_store().await.unwrap();
    let text = get_session_timeline(store.as_ref(), 9).await.unwrap();
    assert_eq!(text, "No events found for session 9.");
}

// =============================================================================
// ENTITY EVENTS
// =============================================================================

#[tokio::test]
async fn test_entity_events_case_insensitive_and_sorted() {
    let store = sample_store().await.unwrap();
    let text = get_entity_events(store.as_ref(), "  THALANTYR ").await.unwrap();

    assert!(text.starts_with("Events involving '  THALANTYR ' (2 results):"));
    let meeting = text.find("[S2.0] (meeting)").unwrap();
    let combat = text.find("[S2.1] (combat)").unwrap();
    assert!(meeting < combat);
}

#[tokio::test]
async fn test_entity_events_matches_any_listed_name() {
    let store = sample_store().await.unwrap();
    let text = get_entity_events(store.as_ref(), "imoen").await.unwrap();

    assert!(text.contains("(5 results)"));
    let order: Vec<usize> = ["[S1.0]", "[S1.2]", "[S2.0]", "[S2.1]", "[S3.0]"]
        .iter()
        .map(|tag| text.find(tag).unwrap())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_entity_events_no_match_suggests_search() {
    let store = sample_store().await.unwrap();
    let text = get_entity_events(store.as_ref(), "Thalant").await.unwrap();
    assert_eq!(
        text,
        "No events involve 'Thalant'. Check the exact name with search_entities."
    );
}

// =============================================================================
// ENTITY CARD
// =============================================================================

#[tokio::test]
async fn test_entity_card_exact_case_insensitive() {
    let store = sample_store().await.unwrap();
    let text = get_entity_card(store.as_ref(), "thalantyr").await.unwrap();
    assert!(text.starts_with("Entity: Thalantyr\nType: character\nStatus: alive\n"));
    assert!(text.contains("Present from session 2 to session 2"));
    assert!(text.contains("Card:\nA reclusive conjurer"));
}

#[tokio::test]
async fn test_entity_card_misspelling_is_not_found() {
    let store = sample_store().await.unwrap();
    let text = get_entity_card(store.as_ref(), "thalentyr").await.unwrap();
    assert_eq!(
        text,
        "No entity found with the exact name 'thalentyr'. Try search_entities for an approximate search."
    );
}

// =============================================================================
// SEMANTIC SEARCH
// =============================================================================

#[tokio::test]
async fn test_search_events_renders_relevance() {
    let store = sample_store().await.unwrap();
    let text = search_events(store.as_ref(), "Gorion falls on the road").await.unwrap();

    let blocks: Vec<&str> = text.split("\n\n").collect();
    assert_eq!(blocks.len(), 6);
    assert!(blocks[0].starts_with("[Session 1, event 2] (death)"));
    assert!(blocks[0].contains("\n  Entities involved: Gorion,Imoen\n  Relevance: "));
}

#[tokio::test]
async fn test_search_entities_caps_hits() {
    let store = sample_store().await.unwrap();
    let text = search_entities(store.as_ref(), "wizard who sells scrolls").await.unwrap();

    let blocks: Vec<&str> = text.split("\n\n").collect();
    assert_eq!(blocks.len(), 5);
    assert!(blocks[0].starts_with("[Thalantyr] (type: character, status: alive, sessions: 2-2)"));
}

// =============================================================================
// EMPTY ARCHIVE
// =============================================================================

#[tokio::test]
async fn test_empty_archive_sentinels() {
    let store = empty_store().await.unwrap();

    assert_eq!(
        search_events(store.as_ref(), "anything").await.unwrap(),
        "No events in the archive."
    );
    assert_eq!(
        search_entities(store.as_ref(), "anything").await.unwrap(),
        "No entities in the archive."
    );
    assert_eq!(
        get_entity_events(store.as_ref(), "Imoen").await.unwrap(),
        "No events in the archive."
    );
    assert_eq!(
        get_campaign_overview(store.as_ref()).await.unwrap(),
        "Campaign: 0 session(s), 0 events, 0 entities.\nRecorded sessions: []\n\nEntities by type:"
    );
}

#[tokio::test]
async fn test_campaign_overview() {
    let store = sample_store().await.unwrap();
    let text = get_campaign_overview(store.as_ref()).await.unwrap();

    assert_eq!(
        text,
        "Campaign: 3 session(s), 6 events, 5 entities.\n\
         Recorded sessions: [1, 2, 3]\n\
         \n\
         Entities by type:\n\
         \x20 character: Thalantyr (alive), Imoen (alive), Gorion (dead)\n\
         \x20 place: Beregost (visited), Candlekeep (left behind)"
    );
}

// =============================================================================
// DISPATCH AND FAILURES
// =============================================================================

#[tokio::test]
async fn test_dispatch_through_registry() {
    let store = sample_store().await.unwrap();
    let call = ToolCall::parse("get_session_timeline", &json!({"session_number": 3})).unwrap();
    let text = call.execute(store.as_ref()).await.unwrap();
    assert!(text.contains("Feldpost Inn"));
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let store = UnreachableStore;
    let err = search_events(&store, "anything").await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));

    let err = get_campaign_overview(&store).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

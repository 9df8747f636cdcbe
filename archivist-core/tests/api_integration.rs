//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p archivist-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - API costs in CI
//! - Test failures when no API key is available
//! - Slow test runs (API calls take seconds)

use archivist_core::testing::sample_store;
use archivist_core::{Archivist, ArchivistConfig, NameCorrector};
use claude::Claude;
use std::sync::Arc;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p archivist-core --test api_integration -- --ignored
async fn test_corrects_misspelled_name() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let engine = Arc::new(Claude::from_env().expect("Failed to create client"));
    let corrector = NameCorrector::new(
        engine,
        vec!["Thalantyr".to_string(), "Imoen".to_string(), "Beregost".to_string()],
    );

    let corrected = corrector.correct("Who is thalentyr?").await;
    println!("Corrected: {corrected}");
    assert!(corrected.contains("Thalantyr"));
}

#[tokio::test]
#[ignore] // Run with: cargo test -p archivist-core --test api_integration -- --ignored
async fn test_answers_from_the_archive() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let engine = Arc::new(Claude::from_env().expect("Failed to create client"));
    let store = sample_store().await.expect("Failed to load sample store");
    let archivist = Archivist::new(ArchivistConfig::default(), engine, store)
        .await
        .expect("Failed to create archivist");

    let answer = archivist
        .ask("What happened to Gorion?")
        .await
        .expect("Ask failed");

    println!("Answer: {}", answer.answer);
    for step in &answer.steps {
        println!("  {} {} -> {}", step.tool_name, step.arguments, step.result_preview);
    }

    assert!(!answer.answer.is_empty());
    assert!(!answer.steps.is_empty(), "Expected at least one tool call");
}

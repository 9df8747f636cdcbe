//! QA tests for the admission gate.
//!
//! These tests verify that the worker pool bounds concurrent runs and that
//! queued requests are served, not dropped.
//!
//! Run with: `cargo test -p archivist-core --test qa_concurrency`

use archivist_core::testing::{sample_store, ScriptedEngine};
use archivist_core::{Archivist, ArchivistConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_five_requests_two_slots() {
    let engine = Arc::new(
        ScriptedEngine::new()
            .with_latency(Duration::from_millis(50))
            .with_default_answer("Patience... all things in their time."),
    );
    let store = sample_store().await.unwrap();
    let archivist = Arc::new(
        Archivist::new(ArchivistConfig::default(), engine.clone(), store)
            .await
            .unwrap(),
    );
    assert_eq!(archivist.pool().capacity(), 2);

    let questions = [
        "Who is Imoen?",
        "What happened in session 1?",
        "Where is Beregost?",
        "Who was Gorion?",
        "What does Thalantyr sell?",
    ];

    let handles: Vec<_> = questions
        .iter()
        .map(|question| {
            let archivist = archivist.clone();
            let question = question.to_string();
            tokio::spawn(async move { archivist.ask(&question).await })
        })
        .collect();

    let answers = futures::future::join_all(handles).await;

    assert_eq!(answers.len(), 5);
    for answer in answers {
        let answer = answer.unwrap().unwrap();
        assert_eq!(answer.answer, "Patience... all things in their time.");
    }
    assert_eq!(engine.peak_concurrency(), 2);
    assert_eq!(archivist.pool().available(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_slot_serialises_runs() {
    let engine = Arc::new(ScriptedEngine::new().with_latency(Duration::from_millis(20)));
    let store = sample_store().await.unwrap();
    let config = ArchivistConfig::default().with_concurrency(1);
    let archivist = Arc::new(Archivist::new(config, engine.clone(), store).await.unwrap());

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let archivist = archivist.clone();
            tokio::spawn(async move { archivist.ask(&format!("Question {i}")).await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(engine.peak_concurrency(), 1);
}

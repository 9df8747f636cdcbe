//! Proper-noun correction of incoming questions.
//!
//! Asks the completion engine to fix misspelled entity names against the
//! known vocabulary. Best effort: any failure or implausible output leaves the
//! question untouched.

use crate::engine::CompletionEngine;
use claude::{Message, Request};
use std::sync::Arc;

const NAME_CORRECTION_PROMPT: &str = include_str!("prompts/name_correction.txt");

/// Maximum tokens for a corrected question.
const CORRECTION_MAX_TOKENS: usize = 512;

/// Corrects entity names in questions against a fixed vocabulary.
pub struct NameCorrector {
    engine: Arc<dyn CompletionEngine>,
    model: Option<String>,
    vocabulary: Vec<String>,
    system_prompt: String,
}

impl NameCorrector {
    /// Build a corrector over `vocabulary`, which is sorted here once.
    pub fn new(engine: Arc<dyn CompletionEngine>, mut vocabulary: Vec<String>) -> Self {
        vocabulary.sort();
        vocabulary.dedup();
        let system_prompt =
            NAME_CORRECTION_PROMPT.replace("{entity_names}", &vocabulary.join(", "));
        Self {
            engine,
            model: None,
            vocabulary,
            system_prompt,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Known names, sorted.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Return `question` with misspelled names fixed, or unchanged.
    pub async fn correct(&self, question: &str) -> String {
        if self.vocabulary.is_empty() {
            return question.to_string();
        }

        let mut request = Request::new(vec![Message::user(question)])
            .with_system(&self.system_prompt)
            .with_max_tokens(CORRECTION_MAX_TOKENS)
            .with_temperature(0.0);
        if let Some(ref model) = self.model {
            request = request.with_model(model);
        }

        match self.engine.complete(request).await {
            Ok(response) => {
                let candidate = response.text();
                match accept(question, &candidate) {
                    Some(corrected) => {
                        if corrected != question {
                            tracing::info!(
                                original = %question,
                                corrected = %corrected,
                                "Question corrected"
                            );
                        }
                        corrected
                    }
                    None => {
                        tracing::warn!(
                            candidate_chars = candidate.chars().count(),
                            "Discarding implausible correction"
                        );
                        question.to_string()
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Name correction failed, keeping original question");
                question.to_string()
            }
        }
    }
}

/// Accept a candidate correction when, once trimmed, it is non-empty and at
/// most twice as long as the question, counted in characters.
pub fn accept(question: &str, candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.chars().count() > question.chars().count() * 2 {
        return None;
    }
    Some(candidate.to_string())
}

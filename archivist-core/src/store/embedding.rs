//! Text embedding for semantic queries.
//!
//! [`HashingEmbedder`] runs in-process with no model download; it hashes word
//! and character-trigram features into a fixed-size vector, so misspelled
//! names still land near their canonical spelling. [`HttpEmbedder`] talks to
//! any OpenAI-compatible `/embeddings` endpoint.

use super::StoreError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

/// Default dimension of the hashing embedder.
const HASHING_DIMENSION: usize = 512;

/// Weight of a character trigram relative to a whole word.
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Maximum attempts for a remote embedding call.
const MAX_RETRIES: u32 = 3;

/// Maps text to vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Deterministic feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(HASHING_DIMENSION)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed a single text. The result is L2-normalised, or all zeros for
    /// text without any word characters.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            vector[self.bucket(&word)] += 1.0;

            let chars: Vec<char> = format!("^{word}$").chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(&trigram)] += TRIGRAM_WEIGHT;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn bucket(&self, feature: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        (hasher.finish() % self.dimension as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

/// Embedder backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// A failed embedding request, split by whether another attempt can help.
enum RequestFailure {
    /// Network errors, rate limiting and server errors.
    Transient(StoreError),
    /// Rejected requests (bad key, unknown model) and unusable responses.
    Permanent(StoreError),
}

/// Whether an HTTP status is worth retrying.
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Embedding(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RequestFailure> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                input: texts,
                model: &self.model,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                RequestFailure::Transient(StoreError::Embedding(format!("Request failed: {e}")))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::Embedding(format!("API error {status}: {body}"));
            return Err(if is_retryable(status) {
                RequestFailure::Transient(error)
            } else {
                RequestFailure::Permanent(error)
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            RequestFailure::Permanent(StoreError::Embedding(format!(
                "Failed to parse response: {e}"
            )))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(RequestFailure::Permanent(StoreError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            ))));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
            match self.request(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(RequestFailure::Permanent(e)) => {
                    tracing::error!(error = %e, "Embedding request rejected");
                    return Err(e);
                }
                Err(RequestFailure::Transient(e)) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| StoreError::Embedding("no attempt made".to_string())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Cosine distance between two vectors: `1 - cos(a, b)`.
///
/// Zero vectors are at distance 1 from everything.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed_one("The wizard Thalantyr guards his tower");
        let b = embedder.embed_one("The wizard Thalantyr guards his tower");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_misspelling_stays_close() {
        let embedder = HashingEmbedder::new();
        let name = embedder.embed_one("Thalantyr");
        let typo = embedder.embed_one("thalentyr");
        let other = embedder.embed_one("Beregost harbour");
        assert!(cosine_distance(&name, &typo) < cosine_distance(&name, &other));
    }

    #[test]
    fn test_only_transient_statuses_are_retried() {
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::with_dimension(16);
        let v = embedder.embed_one("  ,;  ");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_distance(&v, &embedder.embed_one("tower")), 1.0);
    }

    #[test]
    fn test_distance_bounds_for_hashing_vectors() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed_one("ambush on the road");
        let b = embedder.embed_one("ambush on the road");
        assert!(cosine_distance(&a, &b).abs() < 1e-5);
        let c = embedder.embed_one("zzz");
        let d = cosine_distance(&a, &c);
        assert!((0.0..=1.0).contains(&d));
    }
}

//! Completion engine seam.
//!
//! The orchestrator and the name corrector talk to the language model only
//! through [`CompletionEngine`], so tests can swap in a scripted engine.

use async_trait::async_trait;
use claude::{Claude, Error, Request, Response};

/// Anything that can complete a Messages API request.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn complete(&self, request: Request) -> Result<Response, Error>;
}

#[async_trait]
impl CompletionEngine for Claude {
    async fn complete(&self, request: Request) -> Result<Response, Error> {
        Claude::complete(self, request).await
    }
}

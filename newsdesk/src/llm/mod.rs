use anyhow::Result;

/// Core trait for generative-text providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Failures callers need to tell apart. Providers return them wrapped in `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API rate limited (429): {body}")]
    RateLimited { body: String },

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("LLM request timed out after {seconds}s")]
    TimedOut { seconds: u64 },

    #[error("LLM still rate limited after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("LLM request cancelled")]
    Cancelled,

    #[error("LLM provider not configured")]
    NotConfigured,
}

impl LlmError {
    /// Whether `err` (or anything it wraps) is a rate-limit response.
    pub fn is_rate_limited(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<LlmError>(), Some(LlmError::RateLimited { .. }))
    }
}

pub mod disabled;
pub mod insight;
pub mod remote;

pub use disabled::DisabledProvider;
pub use insight::{InsightGenerator, RetryPolicy};

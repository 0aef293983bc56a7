use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{LlmError, LlmProvider, LlmRequest};
use crate::models::NewsItem;

/// Backoff schedule for rate-limited calls: attempt `n` (1-based) waits
/// `base_delay * 2^(n-1)` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Produces short AI insights for news items and replies in comment threads.
pub struct InsightGenerator {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl InsightGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts every pending attempt and backoff wait of this generator.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Insight text for `item`. Never fails: errors come back as readable text.
    pub async fn generate(&self, item: &NewsItem) -> String {
        match self.complete(insight_prompt(item)).await {
            Ok(text) => text,
            Err(e) => describe_failure(&e),
        }
    }

    /// Run `prompt` through the provider, retrying only rate-limit responses.
    pub async fn complete(&self, prompt: String) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            // Token budget, temperature and timeout come from the provider's configuration.
            let request = LlmRequest {
                prompt: prompt.clone(),
                max_tokens: None,
                temperature: None,
                timeout_seconds: None,
            };

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(LlmError::Cancelled.into()),
                outcome = self.provider.generate(request) => outcome,
            };

            let err = match outcome {
                Ok(response) => {
                    info!(attempt, model = %response.model, "insight generated");
                    return Ok(response.content.trim().to_string());
                }
                Err(e) => e,
            };

            if !LlmError::is_rate_limited(&err) {
                warn!(attempt, error = %err, "insight request failed");
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                warn!(attempt, "insight endpoint still rate limited, giving up");
                return Err(LlmError::RetriesExhausted { attempts: attempt }.into());
            }

            let delay = self.policy.delay_after(attempt);
            warn!(attempt, ?delay, "insight endpoint rate limited, backing off");
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(LlmError::Cancelled.into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Prompt asking for a short insight on one catalog item.
pub fn insight_prompt(item: &NewsItem) -> String {
    let mut prompt = String::from(
        "You are a news analyst. Write a short insight (3-4 sentences) on the headline below: \
         what happened, why it matters, and what to watch next. Plain text, no markdown.\n\n",
    );
    prompt.push_str(&format!("Headline: {}\n", item.title));
    if !item.keyword.is_empty() {
        prompt.push_str(&format!("Topic: {}\n", item.keyword));
    }
    if !item.summary.is_empty() {
        prompt.push_str(&format!("Summary: {}\n", item.summary));
    }
    prompt
}

/// Prompt for the assistant reply to a user comment under an insight.
pub fn reply_prompt(item_title: &str, user_text: &str) -> String {
    format!(
        "You are a helpful news assistant discussing the article \"{}\". \
         Reply concisely (2-3 sentences) to the reader's comment.\n\n\
         Reader: {}\nAssistant:",
        item_title, user_text
    )
}

/// Readable text shown in place of an insight that could not be produced.
pub fn describe_failure(err: &anyhow::Error) -> String {
    match err.downcast_ref::<LlmError>() {
        Some(LlmError::RetriesExhausted { .. }) | Some(LlmError::RateLimited { .. }) => {
            "The insight service is busy right now. Please try again in a moment.".to_string()
        }
        Some(LlmError::NotConfigured) => "AI insights are not configured.".to_string(),
        Some(LlmError::Cancelled) => "Insight generation was cancelled.".to_string(),
        _ => format!("Could not generate an insight: {}", err),
    }
}

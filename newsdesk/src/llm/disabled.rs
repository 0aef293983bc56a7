use anyhow::Result;

use super::{LlmError, LlmProvider, LlmRequest, LlmResponse};

/// Stand-in used when `llm.adapter = "none"` or no endpoint is configured.
/// Every call fails, which the insight generator turns into inline error text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

#[async_trait::async_trait]
impl LlmProvider for DisabledProvider {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse> {
        Err(LlmError::NotConfigured.into())
    }
}

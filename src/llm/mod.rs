pub mod fake;
pub mod models;
pub mod openai;

use fake::FakeGateway;
use openai::OpenAiGateway;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::AppConfig;
use models::{Completion, CompletionRequest};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("API Error: {0}")]
    Api(String),
    #[error("message and token must be provided")]
    InvalidRequest,
    #[error("Rate Limited")]
    RateLimited,
    #[error("completion returned no usable reply")]
    EmptyReply,
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait CompletionGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError>;
}

/// Builds the configured completion gateway.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_default(config: &AppConfig) -> Option<Arc<dyn CompletionGateway>> {
        match config.llm.provider.as_str() {
            "openai" => Some(Arc::new(OpenAiGateway::new(
                config.llm.api_base.clone(),
                config.llm.model.clone(),
                config.llm.temperature,
                config.chat.system_prompt.clone(),
                config.chat.max_history_messages,
            ))),
            "fake" => Some(Arc::new(FakeGateway::default())),
            _ => None,
        }
    }
}

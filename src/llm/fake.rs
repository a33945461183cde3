use async_trait::async_trait;

use crate::llm::models::{Completion, CompletionRequest};
use crate::llm::{CompletionGateway, LlmError};

/// Offline gateway answering every turn with a canned reply.
pub struct FakeGateway {
    reply: String,
}

impl FakeGateway {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new("This is a fake completion.")
    }
}

#[async_trait]
impl CompletionGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError> {
        if request.turn.is_empty() || request.token.is_empty() {
            return Err(LlmError::InvalidRequest);
        }
        Ok(Completion {
            reply: self.reply.clone(),
            context: None,
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(turn: &'a str, token: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            turn,
            token,
            context: "",
            history: &[],
        }
    }

    #[tokio::test]
    async fn replies_with_canned_text() {
        let gateway = FakeGateway::new("canned");
        let completion = gateway.complete(request("hello", "token")).await.unwrap();
        assert_eq!(completion.reply, "canned");
        assert!(completion.context.is_none());
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let gateway = FakeGateway::default();
        assert!(matches!(
            gateway.complete(request("hello", "")).await,
            Err(LlmError::InvalidRequest)
        ));
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::llm::{
    models::{Completion, CompletionRequest, Message, Usage},
    CompletionGateway, LlmError,
};

/// OpenAI-compatible chat completions endpoint. The caller's token is used as
/// the API key for each request.
pub struct OpenAiGateway {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    system_prompt: Option<String>,
    max_history: usize,
}

impl OpenAiGateway {
    pub fn new(
        base_url: String,
        model: String,
        temperature: f32,
        system_prompt: Option<String>,
        max_history: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
            temperature,
            system_prompt,
            max_history,
        }
    }

    fn build_messages(&self, request: &CompletionRequest<'_>) -> Vec<Message> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(Message::new("system", system.clone()));
        }
        if !request.context.is_empty() {
            messages.push(Message::new("system", request.context));
        }

        let skip = request.history.len().saturating_sub(self.max_history);
        messages.extend(request.history[skip..].iter().map(Message::from));
        messages.push(Message::new("user", request.turn));
        messages
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError> {
        if request.turn.is_empty() || request.token.is_empty() {
            return Err(LlmError::InvalidRequest);
        }

        let body = json!({
            "model": self.model,
            "messages": self.build_messages(&request),
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(request.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited);
            }
            return Err(LlmError::Api(format!("OpenAI Error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let reply = json["choices"][0]["message"]["content"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyReply)?
            .to_string();

        let usage = json.get("usage").map(|u| Usage {
            input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(Completion {
            reply,
            context: None,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::{Message as StoredMessage, Sender};

    fn stored(id: i64, sender: Sender, body: &str) -> StoredMessage {
        StoredMessage {
            id,
            conversation_id: 1,
            body: body.to_string(),
            sender,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn prompt_includes_context_and_trimmed_history() {
        let gateway = OpenAiGateway::new(
            "http://localhost".into(),
            "gpt-test".into(),
            0.2,
            Some("be brief".into()),
            2,
        );
        let history = vec![
            stored(1, Sender::User, "first"),
            stored(2, Sender::Bot, "second"),
            stored(3, Sender::User, "third"),
        ];
        let request = CompletionRequest {
            turn: "now",
            token: "t",
            context: "talking about rust",
            history: &history,
        };

        let messages = gateway.build_messages(&request);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "system", "assistant", "user", "user"]);
        assert_eq!(messages[1].content, "talking about rust");
        assert_eq!(messages[2].content, "second");
        assert_eq!(messages.last().unwrap().content, "now");
    }
}

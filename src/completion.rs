//! Chat-completion client that turns a free-text shopping request into a
//! [`ParsedRequest`].

use crate::config::CompletionConfig;
use crate::error::AssistantError;
use crate::parsers::request::{build_instruction, parse_completion_content};
use crate::results::ParsedRequest;
use crate::utils::preview;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

pub struct CompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Ask the completion endpoint to structure `free_text`.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::RemoteService`] on a non-2xx status or a reply
    ///   without a message.
    /// - [`AssistantError::Parse`] when the message is not the expected JSON.
    /// - [`AssistantError::Http`] on network failure.
    pub async fn parse_request(
        &self,
        free_text: &str,
        credential: &str,
    ) -> Result<ParsedRequest, AssistantError> {
        let instruction = build_instruction(free_text);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &instruction,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        ::log::info!("Parsing request: {}", preview(free_text, 80));
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            ::log::error!("Completion service returned {}: {}", status, message);
            return Err(AssistantError::RemoteService {
                status: Some(status.as_u16()),
                message,
            });
        }

        let reply: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| AssistantError::RemoteService {
                    status: Some(status.as_u16()),
                    message: format!("malformed completion reply: {}", e),
                })?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| AssistantError::RemoteService {
                status: Some(status.as_u16()),
                message: "completion reply carried no message".to_string(),
            })?;

        ::log::debug!("Completion content: {}", preview(&content, 200));
        let parsed = parse_completion_content(&content)?;
        ::log::info!("Parsed request: {:?}", parsed);
        Ok(parsed)
    }
}

//! OpenAI-compatible chat client and the providers built on it

use crate::config::ProvidersConfig;
use crate::quality::{Classification, ClassifierError, QualityClassifier};
use crate::rewrite::{RewriteError, RewriteProvider, Role, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REWRITE_SYSTEM_PROMPT: &str = "Rewrite the user's latest question as a standalone search \
query, resolving pronouns and references from the conversation. Reply with the query only, \
no explanation.";

const CLASSIFIER_SYSTEM_PROMPT: &str = "Classify the following message as BUSINESS or SPAM. \
BUSINESS covers anything related to the company's operations: orders, invoices, projects, \
scheduling, internal discussion. SPAM covers marketing, newsletters, phishing, and bulk mail. \
Reply with exactly one word: BUSINESS or SPAM.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Minimal chat-completions client
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(config: &ProvidersConfig) -> crate::error::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            crate::error::CortexError::Config(format!(
                "API key environment variable {} is not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                crate::error::CortexError::Config(format!("HTTP client init failed: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.chat_model.clone(),
        })
    }

    /// One-shot completion over a prepared message list
    pub async fn complete(&self, messages: Vec<(String, String)>) -> Result<String, String> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages
                .into_iter()
                .map(|(role, content)| ChatMessage { role, content })
                .collect(),
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("chat endpoint returned {}: {}", status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {}", e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "empty choices in response".to_string())
    }
}

/// Query rewriting backed by the chat model
pub struct OpenAiRewriteProvider {
    client: OpenAiChatClient,
}

impl OpenAiRewriteProvider {
    pub fn new(client: OpenAiChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RewriteProvider for OpenAiRewriteProvider {
    async fn rewrite(&self, history: &[Turn], query: &str) -> Result<String, RewriteError> {
        let mut messages = vec![("system".to_string(), REWRITE_SYSTEM_PROMPT.to_string())];
        for turn in history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push((role.to_string(), turn.text.clone()));
        }
        messages.push(("user".to_string(), query.to_string()));

        self.client
            .complete(messages)
            .await
            .map_err(RewriteError::Provider)
    }
}

/// Spam classification backed by the chat model
pub struct OpenAiClassifier {
    client: OpenAiChatClient,
}

impl OpenAiClassifier {
    pub fn new(client: OpenAiChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QualityClassifier for OpenAiClassifier {
    async fn classify(&self, title: &str, text: &str) -> Result<Classification, ClassifierError> {
        let messages = vec![
            ("system".to_string(), CLASSIFIER_SYSTEM_PROMPT.to_string()),
            (
                "user".to_string(),
                format!("Subject: {}\n\n{}", title, text),
            ),
        ];

        let answer = self
            .client
            .complete(messages)
            .await
            .map_err(ClassifierError::Provider)?;

        if answer.trim().to_uppercase().starts_with("SPAM") {
            Ok(Classification::Spam)
        } else {
            // Ambiguous answers default to keeping the document
            Ok(Classification::Business)
        }
    }
}

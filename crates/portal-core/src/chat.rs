//! Math tutor chat
//!
//! One-shot chat completions against an OpenAI-compatible endpoint. The
//! service never fails from the caller's point of view: errors turn into
//! a friendly reply.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::models::{ChatMessage, ChatRole};

pub const SYSTEM_PROMPT: &str = "You are a friendly and expert AI Math Tutor for Sir Sandeep \
Baghel's Math Portal. Help students with their math problems and questions about the portal. \
Be concise, warm, and professional. Your internal reasoning is hidden, so provide only the \
final helpful answer.";

pub const GREETING: &str =
    "Hi! I am your AI Math Tutor. Ask me anything about your math lessons!";

pub const EMPTY_REPLY: &str = "I couldn't generate a response. Please try again.";

pub const AUTH_ERROR_REPLY: &str = "Authentication Error: The AI service is currently \
unavailable. Please check the API configuration.";

pub const CONNECTION_ERROR_REPLY: &str =
    "I'm having a bit of trouble connecting to my brain. Please try again in a moment!";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No API key configured for the chat service")]
    MissingKey,

    #[error("Chat request failed with status {0}")]
    Status(u16),

    #[error("Chat request failed: {0}")]
    Transport(String),

    #[error("Unreadable chat response: {0}")]
    Decode(String),
}

impl ChatError {
    fn is_auth(&self) -> bool {
        matches!(self, ChatError::MissingKey)
            || matches!(self, ChatError::Status(code) if *code == StatusCode::UNAUTHORIZED.as_u16())
    }
}

/// Something that answers a chat turn
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Raw completion for `input` given the prior `history`
    async fn complete(&self, history: &[ChatMessage], input: &str) -> Result<String, ChatError>;

    /// Completion as shown to the user, with failures turned into text
    async fn chat(&self, history: &[ChatMessage], input: &str) -> String {
        reply_text(self.complete(history, input).await)
    }
}

/// Map a completion result to the text shown to the user
pub fn reply_text(result: Result<String, ChatError>) -> String {
    match result {
        Ok(raw) => {
            let clean = strip_reasoning(&raw);
            if clean.is_empty() {
                EMPTY_REPLY.to_string()
            } else {
                clean
            }
        }
        Err(e) if e.is_auth() => {
            warn!("Chat service rejected credentials: {}", e);
            AUTH_ERROR_REPLY.to_string()
        }
        Err(e) => {
            warn!("Chat service error: {}", e);
            CONNECTION_ERROR_REPLY.to_string()
        }
    }
}

/// Remove `<think>...</think>` blocks and surrounding whitespace
pub fn strip_reasoning(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &after_open[end + CLOSE.len()..];
            }
            // An unterminated block is left as is
            None => break,
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn wire_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Model => "assistant",
    }
}

fn build_request<'a>(
    model: &'a str,
    temperature: f32,
    history: &'a [ChatMessage],
    input: &'a str,
) -> CompletionRequest<'a> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(WireMessage {
        role: "system",
        content: SYSTEM_PROMPT,
    });
    messages.extend(history.iter().map(|m| WireMessage {
        role: wire_role(m.role),
        content: &m.text,
    }));
    messages.push(WireMessage {
        role: "user",
        content: input,
    });
    CompletionRequest {
        model,
        messages,
        temperature,
    }
}

/// OpenRouter (or any OpenAI-compatible) chat completions client
pub struct OpenRouterChat {
    http: Client,
    config: ChatConfig,
}

impl OpenRouterChat {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ChatService for OpenRouterChat {
    async fn complete(&self, history: &[ChatMessage], input: &str) -> Result<String, ChatError> {
        let api_key = self.config.api_key.as_deref().ok_or(ChatError::MissingKey)?;
        let body = build_request(&self.config.model, self.config.temperature, history, input);

        debug!("Sending chat request with {} history messages", history.len());
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .header("X-Title", "Math Portal")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            debug!("Chat error body: {}", details);
            return Err(ChatError::Status(status.as_u16()));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

/// An ordered chat transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// A transcript opening with the tutor's greeting
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::model(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send a user turn and append the reply
    ///
    /// Blank input is ignored and returns `None`.
    pub async fn send(&mut self, service: &dyn ChatService, input: &str) -> Option<&ChatMessage> {
        if input.trim().is_empty() {
            return None;
        }
        let reply = service.chat(&self.messages, input).await;
        self.messages.push(ChatMessage::user(input));
        self.messages.push(ChatMessage::model(reply));
        self.messages.last()
    }
}

//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are cheap to clone. `complete` is an `async fn` on the
//! enum so callers need no trait-object machinery.

pub mod providers;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::OpenRouterConfig;

pub use providers::build;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("missing API key: set OPENROUTER_API_KEY (or LLM_API_KEY)")]
    MissingApiKey,
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One chat completion call. `None` fields are left to the provider default.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// A request holding a single user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { messages: vec![ChatMessage::user(content)], ..Self::default() }
    }

    pub fn with_system(mut self, content: impl Into<String>) -> Self {
        self.messages.insert(0, ChatMessage::system(content));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Content of the last user message, if any.
    pub fn last_user(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

// ── Retry ─────────────────────────────────────────────────────────────────────

/// Fixed attempt count with linear backoff: the wait after attempt `k`
/// (1-based) is `delay * k`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &OpenRouterConfig) -> Self {
        Self {
            attempts: cfg.max_retries.max(1),
            delay: Duration::from_millis(cfg.request_delay_ms),
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, delay: Duration::from_secs(1) }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    OpenRouter(providers::openrouter::OpenRouterProvider),
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    /// One round trip. Returns the trimmed reply text.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        match self {
            LlmProvider::OpenRouter(p) => p.complete(request).await,
            LlmProvider::Dummy(p) => p.complete(request).await,
        }
    }

    /// [`complete`](Self::complete) with up to `policy.attempts` tries.
    /// The last error is returned once attempts run out.
    pub async fn complete_with_retry(
        &self,
        request: &ChatRequest,
        policy: &RetryPolicy,
    ) -> Result<String, ProviderError> {
        let attempts = policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < attempts => {
                    let wait = policy.backoff(attempt);
                    warn!(attempt, attempts, error = %e, wait_ms = wait.as_millis() as u64, "LLM request failed, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempts, error = %e, "LLM request failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::dummy::DummyProvider;

    fn no_wait(attempts: u32) -> RetryPolicy {
        RetryPolicy { attempts, delay: Duration::ZERO }
    }

    #[test]
    fn request_builder_orders_messages() {
        let req = ChatRequest::user("问题").with_system("你是主持人").with_max_tokens(200);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.last_user(), Some("问题"));
        assert_eq!(req.max_tokens, Some(200));
        assert_eq!(req.temperature, None);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }

    #[test]
    fn backoff_is_linear() {
        let p = RetryPolicy { attempts: 3, delay: Duration::from_millis(500) };
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn retry_recovers_after_failures() {
        let dummy = DummyProvider::scripted([Err("boom"), Err("boom"), Ok("{是}")]);
        let llm = LlmProvider::Dummy(dummy.clone());
        let out = llm.complete_with_retry(&ChatRequest::user("q"), &no_wait(3)).await.unwrap();
        assert_eq!(out, "{是}");
        assert_eq!(dummy.calls(), 3);
    }

    #[tokio::test]
    async fn retry_returns_last_error() {
        let dummy = DummyProvider::scripted([Err("first"), Err("second"), Ok("late")]);
        let llm = LlmProvider::Dummy(dummy.clone());
        let err = llm.complete_with_retry(&ChatRequest::user("q"), &no_wait(2)).await.unwrap_err();
        assert!(err.to_string().contains("second"));
        assert_eq!(dummy.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_sleeps_between_attempts() {
        let dummy = DummyProvider::scripted([Err("a"), Err("b"), Ok("ok")]);
        let llm = LlmProvider::Dummy(dummy);
        let policy = RetryPolicy { attempts: 3, delay: Duration::from_secs(1) };
        let start = tokio::time::Instant::now();
        llm.complete_with_retry(&ChatRequest::user("q"), &policy).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }
}

//! Dummy LLM provider for dry runs and tests.
//!
//! By default it echoes the last user message back prefixed with `[echo]`.
//! A scripted instance replays queued replies (or failures) in order and
//! falls back to echoing once the script runs dry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::llm::{ChatRequest, ProviderError};

type Script = VecDeque<Result<String, String>>;

#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
}

impl DummyProvider {
    /// Replay `replies` in order. `Err(msg)` entries become request failures.
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<S, S>>,
        S: Into<String>,
    {
        let script = replies.into_iter().map(|r| r.map(Into::into).map_err(Into::into)).collect();
        Self { script: Arc::new(Mutex::new(script)), calls: Arc::default() }
    }

    /// Number of `complete` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(text)) => Ok(text.trim().to_string()),
            Some(Err(msg)) => Err(ProviderError::Request(msg)),
            None => Ok(format!("[echo] {}", request.last_user().unwrap_or_default())),
        }
    }
}

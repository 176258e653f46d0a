//! LLM provider implementations.
//!
//! `build(config)` is the factory, called once per job.

pub mod dummy;
pub mod openrouter;

use crate::config::Config;
use crate::llm::{LlmProvider, ProviderError};

/// Construct the configured provider.
///
/// The API key comes from the environment (see `config::load`). It is only
/// required when the `openrouter` provider is selected.
pub fn build(config: &Config) -> Result<LlmProvider, ProviderError> {
    match config.llm.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider::default())),
        "openrouter" => {
            let api_key = config.llm_api_key.clone().ok_or(ProviderError::MissingApiKey)?;
            let p = openrouter::OpenRouterProvider::new(&config.llm.openrouter, api_key)?;
            Ok(LlmProvider::OpenRouter(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.llm.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_needs_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::offline(dir.path());
        assert!(matches!(build(&config), Ok(LlmProvider::Dummy(_))));
    }

    #[test]
    fn openrouter_without_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::offline(dir.path());
        config.llm.provider = "openrouter".into();
        config.llm_api_key = None;
        assert!(matches!(build(&config), Err(ProviderError::MissingApiKey)));
    }

    #[test]
    fn openrouter_with_key_builds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::offline(dir.path());
        config.llm.provider = "openrouter".into();
        config.llm_api_key = Some("sk-test".into());
        assert!(matches!(build(&config), Ok(LlmProvider::OpenRouter(_))));
    }

    #[test]
    fn unknown_provider_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::offline(dir.path());
        config.llm.provider = "gemini".into();
        let err = build(&config).unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }
}

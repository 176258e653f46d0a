//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `-f`), then applies `HAIGUI_DATA_DIR` and
//! `HAIGUI_LOG_LEVEL` env overrides.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs consumed by the jobs.
//! - **raw**: Raw TOML deserialization types with serde defaults; private.
//! - **load**: `load`, `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Offline `Config` rooted at `data_dir`: dummy LLM, no API key, no
    /// request delays. Used by tests and dry runs.
    pub fn offline(data_dir: &std::path::Path) -> Self {
        Self {
            workspace: WorkspaceConfig {
                data_dir: data_dir.to_path_buf(),
                puzzles_dir: raw::default_puzzles_dir().into(),
                prompts_dir: data_dir.join("prompts"),
            },
            log_level: raw::default_log_level(),
            llm: LlmConfig {
                provider: "dummy".into(),
                openrouter: OpenRouterConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: None,
                    timeout_seconds: 1,
                    max_retries: 1,
                    request_delay_ms: 0,
                    app_title: None,
                    site_url: None,
                },
            },
            llm_api_key: None,
            scrape: ScrapeConfig {
                base_url: "http://localhost:0/en".into(),
                pages: 1,
                delay_ms: 0,
                timeout_seconds: 1,
                user_agent: raw::default_user_agent(),
            },
            logprob: LogprobConfig {
                model_path: data_dir.join("model.gguf"),
                context_size: raw::default_context_size(),
                gpu_layers: 0,
            },
            generation: GenerationConfig {
                followups: raw::default_generation_count(),
                endings: raw::default_generation_count(),
                explanations: raw::default_generation_count(),
            },
        }
    }
}

//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape, the serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub workspace: RawWorkspace,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub scrape: RawScrape,
    #[serde(default)]
    pub logprob: RawLogprob,
    #[serde(default)]
    pub generation: RawGeneration,
}

#[derive(Deserialize)]
pub(super) struct RawWorkspace {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_puzzles_dir")]
    pub puzzles_dir: String,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RawWorkspace {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            puzzles_dir: default_puzzles_dir(),
            prompts_dir: default_prompts_dir(),
            log_level: default_log_level(),
        }
    }
}

pub(super) fn default_data_dir() -> String { ".".to_string() }
pub(super) fn default_puzzles_dir() -> String { "puzzles".to_string() }
pub(super) fn default_prompts_dir() -> String { "config/prompts".to_string() }
pub(super) fn default_log_level() -> String { "info".to_string() }

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openrouter: RawOpenRouter,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openrouter: RawOpenRouter::default() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenRouter {
    #[serde(default = "default_openrouter_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openrouter_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default)]
    pub app_title: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
}

impl Default for RawOpenRouter {
    fn default() -> Self {
        Self {
            api_base_url: default_openrouter_api_base_url(),
            model: default_openrouter_model(),
            temperature: None,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            request_delay_ms: default_request_delay_ms(),
            app_title: None,
            site_url: None,
        }
    }
}

pub(super) fn default_llm_provider() -> String { "openrouter".to_string() }
pub(super) fn default_openrouter_api_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}
pub(super) fn default_openrouter_model() -> String { "deepseek/deepseek-chat-v3-0324".to_string() }
pub(super) fn default_timeout_seconds() -> u64 { 30 }
pub(super) fn default_max_retries() -> u32 { 3 }
pub(super) fn default_request_delay_ms() -> u64 { 1000 }

// ── Scraper ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawScrape {
    #[serde(default = "default_scrape_base_url")]
    pub base_url: String,
    #[serde(default = "default_scrape_pages")]
    pub pages: u32,
    #[serde(default = "default_request_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RawScrape {
    fn default() -> Self {
        Self {
            base_url: default_scrape_base_url(),
            pages: default_scrape_pages(),
            delay_ms: default_request_delay_ms(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

pub(super) fn default_scrape_base_url() -> String { "https://yesnogame.net/en".to_string() }
pub(super) fn default_scrape_pages() -> u32 { 20 }
pub(super) fn default_user_agent() -> String {
    concat!("haigui/", env!("CARGO_PKG_VERSION")).to_string()
}

// ── Local model ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLogprob {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    #[serde(default)]
    pub gpu_layers: u32,
}

impl Default for RawLogprob {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            context_size: default_context_size(),
            gpu_layers: 0,
        }
    }
}

pub(super) fn default_model_path() -> String { "models/qwen2.5-7b-instruct-f16.gguf".to_string() }
pub(super) fn default_context_size() -> u32 { 4096 }

// ── Generation ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawGeneration {
    #[serde(default = "default_generation_count")]
    pub followups: usize,
    #[serde(default = "default_generation_count")]
    pub endings: usize,
    #[serde(default = "default_generation_count")]
    pub explanations: usize,
}

impl Default for RawGeneration {
    fn default() -> Self {
        Self {
            followups: default_generation_count(),
            endings: default_generation_count(),
            explanations: default_generation_count(),
        }
    }
}

pub(super) fn default_generation_count() -> usize { 10 }

//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the jobs consume.
//! Raw TOML deserialization types live in `raw.rs`.

use std::path::{Path, PathBuf};

// ── Workspace ───────────────────────────────────────────────────────────────

/// Where the corpus lives on disk.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Root for every input/output file (already expanded, no `~`).
    pub data_dir: PathBuf,
    /// Markdown puzzle directory, relative to `data_dir` unless absolute.
    pub puzzles_dir: PathBuf,
    /// Prompt template overrides. Built-in templates are used for any file
    /// missing here.
    pub prompts_dir: PathBuf,
}

impl WorkspaceConfig {
    /// Resolve `name` under `data_dir`.
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// The markdown puzzle directory.
    pub fn puzzles_dir(&self) -> PathBuf {
        self.data_dir.join(&self.puzzles_dir)
    }

    /// Resolve `name` inside the puzzle directory.
    pub fn puzzles_file(&self, name: &str) -> PathBuf {
        self.puzzles_dir().join(name)
    }

    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

/// OpenRouter chat completions configuration (`[llm.openrouter]`).
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model identifier passed in the request body.
    pub model: String,
    /// Sampling temperature for requests that set none. Unset leaves it to
    /// the provider.
    pub temperature: Option<f32>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Attempts per request before giving up.
    pub max_retries: u32,
    /// Pause between sequential requests, and the unit of linear backoff.
    pub request_delay_ms: u64,
    /// Sent as `X-Title`.
    pub app_title: Option<String>,
    /// Sent as `HTTP-Referer`.
    pub site_url: Option<String>,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider: `"openrouter"` or `"dummy"`.
    pub provider: String,
    pub openrouter: OpenRouterConfig,
}

// ── Scraper ─────────────────────────────────────────────────────────────────

/// Yes/no puzzle site scraper (`[scrape]`).
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Listing root, e.g. `https://yesnogame.net/en`.
    pub base_url: String,
    /// Listing pages to walk, starting from 1.
    pub pages: u32,
    /// Pause after each scraped item.
    pub delay_ms: u64,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

// ── Local model ─────────────────────────────────────────────────────────────

/// Local causal LM used for log-probability scoring (`[logprob]`).
#[derive(Debug, Clone)]
pub struct LogprobConfig {
    /// GGUF model file.
    pub model_path: PathBuf,
    pub context_size: u32,
    /// Layers offloaded to the GPU (0 = CPU only).
    pub gpu_layers: u32,
}

// ── Generation counts ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub followups: usize,
    pub endings: usize,
    pub explanations: usize,
}

// ── Top level ───────────────────────────────────────────────────────────────

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub log_level: String,
    pub llm: LlmConfig,
    /// From `OPENROUTER_API_KEY` (or `LLM_API_KEY`). Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub scrape: ScrapeConfig,
    pub logprob: LogprobConfig,
    pub generation: GenerationConfig,
}

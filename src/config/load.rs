//! Configuration loading with env-var overrides.
//!
//! Reads a TOML file and applies `HAIGUI_DATA_DIR` and `HAIGUI_LOG_LEVEL`
//! env overrides. The API key only ever comes from the environment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. If no path is given and the default file does not
/// exist, every setting takes its built-in default.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let data_dir_override = env::var("HAIGUI_DATA_DIR").ok();
    let log_level_override = env::var("HAIGUI_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            data_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        load_from(
            default_path,
            data_dir_override.as_deref(),
            log_level_override.as_deref(),
        )
    } else {
        Ok(resolve(
            RawConfig::default(),
            data_dir_override.as_deref(),
            log_level_override.as_deref(),
        ))
    }
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    data_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let raw: RawConfig = toml::from_str(&text)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let config = resolve(raw, data_dir_override, log_level_override);

    match config.llm.provider.as_str() {
        "openrouter" | "dummy" => Ok(config),
        other => Err(AppError::Config(format!(
            "unknown llm provider '{other}' in {} (expected \"openrouter\" or \"dummy\")",
            path.display()
        ))),
    }
}

fn resolve(
    raw: RawConfig,
    data_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Config {
    let ws = raw.workspace;
    let data_dir = expand_home(data_dir_override.unwrap_or(&ws.data_dir));
    let log_level = log_level_override.unwrap_or(&ws.log_level).to_string();

    let or = raw.llm.openrouter;

    Config {
        workspace: WorkspaceConfig {
            data_dir,
            puzzles_dir: expand_home(&ws.puzzles_dir),
            prompts_dir: expand_home(&ws.prompts_dir),
        },
        log_level,
        llm: LlmConfig {
            provider: raw.llm.provider,
            openrouter: OpenRouterConfig {
                api_base_url: or.api_base_url,
                model: or.model,
                temperature: or.temperature,
                timeout_seconds: or.timeout_seconds,
                max_retries: or.max_retries.max(1),
                request_delay_ms: or.request_delay_ms,
                app_title: or.app_title.filter(|s| !s.is_empty()),
                site_url: or.site_url.filter(|s| !s.is_empty()),
            },
        },
        llm_api_key: env::var("OPENROUTER_API_KEY")
            .or_else(|_| env::var("LLM_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty()),
        scrape: ScrapeConfig {
            base_url: raw.scrape.base_url.trim_end_matches('/').to_string(),
            pages: raw.scrape.pages,
            delay_ms: raw.scrape.delay_ms,
            timeout_seconds: raw.scrape.timeout_seconds,
            user_agent: raw.scrape.user_agent,
        },
        logprob: LogprobConfig {
            model_path: expand_home(&raw.logprob.model_path),
            context_size: raw.logprob.context_size,
            gpu_layers: raw.logprob.gpu_layers,
        },
        generation: GenerationConfig {
            followups: raw.generation.followups.max(1),
            endings: raw.generation.endings.max(1),
            explanations: raw.generation.explanations.max(1),
        },
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

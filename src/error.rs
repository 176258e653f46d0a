//! Application-wide error types.

use thiserror::Error;

use crate::llm::ProviderError;
use crate::logprob::LmError;
use crate::stats::StatsError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("usage error: {0}")]
    Usage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("llm error: {0}")]
    Llm(#[from] ProviderError),

    #[error("scrape error: {0}")]
    Scrape(String),

    #[error("model error: {0}")]
    Model(#[from] LmError),

    #[error("stats error: {0}")]
    Stats(#[from] StatsError),
}

impl AppError {
    pub fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        AppError::Json { path: path.display().to_string(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
        assert!(e.to_string().starts_with("config error"));
    }

    #[test]
    fn usage_error_display() {
        let e = AppError::Usage("unknown command 'brew'".into());
        assert!(e.to_string().contains("brew"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }

    #[test]
    fn json_error_names_path() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e = AppError::json(std::path::Path::new("puzzles/puzzles.json"), source);
        assert!(e.to_string().contains("puzzles/puzzles.json"));
        assert!(e.source().is_some());
    }

    #[test]
    fn provider_error_converts() {
        let e: AppError = ProviderError::MissingApiKey.into();
        assert!(e.to_string().starts_with("llm error"));
    }

    #[test]
    fn stats_error_converts() {
        let e: AppError = StatsError::TooFewPoints(1).into();
        assert!(e.to_string().contains("stats error"));
    }
}

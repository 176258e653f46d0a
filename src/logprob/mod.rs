//! Log-probability scoring with a local causal language model.
//!
//! For a `(prompt, continuation)` pair the score is the summed natural-log
//! probability of the continuation tokens, each conditioned on everything
//! before it. A puzzle is scored four ways (answer given question, question
//! given answer, and both unconditioned) and the two "prompt effects" are
//! derived from those.
//!
//! The model sits behind [`CausalLm`]; the llama.cpp backend is only compiled
//! with the `llama` feature.

pub mod jobs;
#[cfg(feature = "llama")]
pub mod llama;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use jobs::{Source, run};

pub type TokenId = u32;

#[derive(Debug, Error)]
pub enum LmError {
    #[error("failed to load model {path}: {message}")]
    Load { path: String, message: String },
    #[error("tokenization failed: {0}")]
    Tokenize(String),
    #[error("forward pass failed: {0}")]
    Decode(String),
    #[error("sequence of {tokens} tokens exceeds the context size of {context}")]
    TooLong { tokens: usize, context: usize },
    #[error("token {token} outside a vocabulary of {vocab}")]
    BadToken { token: TokenId, vocab: usize },
    #[error("no local model backend: rebuild with `--features llama`")]
    BackendDisabled,
}

/// A model that can tokenize text and return next-token logits.
pub trait CausalLm {
    /// Token ids for `text`, prefixed with the BOS token when `add_bos`.
    fn tokenize(&self, text: &str, add_bos: bool) -> Result<Vec<TokenId>, LmError>;

    /// One logits row per input position. Row `i` scores the token at
    /// position `i + 1`.
    fn logits(&mut self, tokens: &[TokenId]) -> Result<Vec<Vec<f32>>, LmError>;
}

/// Numerically stable log-softmax.
pub fn log_softmax(row: &[f32]) -> Vec<f64> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let sum: f64 = row.iter().map(|&x| (x as f64 - max).exp()).sum();
    let log_sum = max + sum.ln();
    row.iter().map(|&x| x as f64 - log_sum).collect()
}

/// Summed log-probability of `continuation` following `prompt`.
///
/// Both the joint text and the prompt alone are tokenized with BOS, so an
/// empty prompt still conditions the first continuation token on BOS.
pub fn continuation_logprob<M: CausalLm + ?Sized>(
    lm: &mut M,
    prompt: &str,
    continuation: &str,
) -> Result<f64, LmError> {
    let full = format!("{prompt}{continuation}");
    let tokens = lm.tokenize(&full, true)?;
    let prompt_len = lm.tokenize(prompt, true)?.len();

    let start = prompt_len.max(1);
    if tokens.len() <= start {
        return Ok(0.0);
    }

    let logits = lm.logits(&tokens)?;
    let mut total = 0.0;
    for i in start..tokens.len() {
        let row = logits.get(i - 1).ok_or_else(|| {
            LmError::Decode(format!("model returned {} logit rows for {} tokens", logits.len(), tokens.len()))
        })?;
        let token = tokens[i];
        let lp = log_softmax(row);
        total += *lp
            .get(token as usize)
            .ok_or(LmError::BadToken { token, vocab: row.len() })?;
    }
    Ok(total)
}

/// The four conditional scores of one puzzle and the two effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogprobReport {
    pub answer_given_puzzle: f64,
    pub puzzle_given_answer: f64,
    pub answer_given_empty: f64,
    pub puzzle_given_empty: f64,
    pub answer_prompt_effect: f64,
    pub puzzle_prompt_effect: f64,
}

pub fn analyze_pair<M: CausalLm + ?Sized>(
    lm: &mut M,
    puzzle: &str,
    answer: &str,
) -> Result<LogprobReport, LmError> {
    let answer_given_puzzle = continuation_logprob(lm, puzzle, answer)?;
    let puzzle_given_answer = continuation_logprob(lm, answer, puzzle)?;
    let answer_given_empty = continuation_logprob(lm, "", answer)?;
    let puzzle_given_empty = continuation_logprob(lm, "", puzzle)?;

    Ok(LogprobReport {
        answer_given_puzzle,
        puzzle_given_answer,
        answer_given_empty,
        puzzle_given_empty,
        answer_prompt_effect: answer_given_puzzle - answer_given_empty,
        puzzle_prompt_effect: puzzle_given_answer - puzzle_given_empty,
    })
}

/// One scored puzzle. Markdown puzzles carry `file`, yes/no puzzles `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPuzzle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub puzzle_text: String,
    pub answer_text: String,
    pub logprobs: LogprobReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogprobStatistics {
    pub total_answer_given_puzzle: f64,
    pub total_puzzle_given_answer: f64,
    pub avg_answer_given_puzzle: f64,
    pub avg_puzzle_given_answer: f64,
}

impl LogprobStatistics {
    /// Totals and means over `puzzles`; all zero for an empty slice.
    pub fn from_puzzles(puzzles: &[ScoredPuzzle]) -> Self {
        let total_answer_given_puzzle: f64 =
            puzzles.iter().map(|p| p.logprobs.answer_given_puzzle).sum();
        let total_puzzle_given_answer: f64 =
            puzzles.iter().map(|p| p.logprobs.puzzle_given_answer).sum();
        let n = puzzles.len();
        let avg = |total: f64| if n == 0 { 0.0 } else { total / n as f64 };

        Self {
            total_answer_given_puzzle,
            total_puzzle_given_answer,
            avg_answer_given_puzzle: avg(total_answer_given_puzzle),
            avg_puzzle_given_answer: avg(total_puzzle_given_answer),
        }
    }
}

/// `puzzle_logprobs.json` / `yesno_puzzle_logprobs.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogprobFile {
    #[serde(default)]
    pub puzzles: Vec<ScoredPuzzle>,
    #[serde(default)]
    pub statistics: LogprobStatistics,
}

impl LogprobFile {
    pub fn from_puzzles(puzzles: Vec<ScoredPuzzle>) -> Self {
        let statistics = LogprobStatistics::from_puzzles(&puzzles);
        Self { puzzles, statistics }
    }

    pub fn refresh_statistics(&mut self) {
        self.statistics = LogprobStatistics::from_puzzles(&self.puzzles);
    }
}

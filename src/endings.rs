//! Story ending and explanation experiments.
//!
//! Records come from `rewritten_puzzles.json`: free-form objects that carry
//! at least `begin_text` and `end_text`. The pipeline is
//!
//! 1. `endings`: ask for `n` alternative endings per story;
//! 2. `ending-probs`: ask the model to weigh those endings against the true
//!    one (optionally told the story's background);
//! 3. `explanations`: ask for `n` explanations of how begin leads to end;
//! 4. `explanation-probs`: weigh those against the true answer.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::{self, ChatRequest, LlmProvider};
use crate::prompt::{Prompts, Template, numbered};
use crate::store;

pub const REWRITTEN_FILE: &str = "rewritten_puzzles.json";
pub const ENDINGS_FILE: &str = "generated_endings.json";
pub const EXPLANATIONS_FILE: &str = "generated_explanations.json";
pub const ENDING_PROBS_FILE: &str = "ending_probs.json";
pub const ENDING_PROBS_BACKGROUND_FILE: &str = "ending_probs_background.json";
pub const EXPLANATION_PROBS_FILE: &str = "explanation_probs.json";

const TOKENS_PER_ITEM: u32 = 50;
const TOKENS_PER_OPTION: u32 = 100;
const PROB_ATTEMPTS: usize = 3;

/// A story record. Fields this module does not know are kept as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_endings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_explanations: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoryRecord {
    /// `(begin, end)` when both are present.
    pub fn story(&self) -> Option<(&str, &str)> {
        Some((self.begin_text.as_deref()?, self.end_text.as_deref()?))
    }
}

/// `ending_probs.json` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingProbs {
    pub begin_text: String,
    pub probs: Vec<f64>,
    pub generated_endings: Vec<String>,
    pub end_text: String,
}

/// `explanation_probs.json` entry. `explanation_probs` is `null` when no
/// valid vector came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationProbs {
    pub begin_text: String,
    pub end_text: String,
    pub generated_explanations: Vec<String>,
    pub explanation_probs: Option<Vec<f64>>,
    pub answer: String,
}

// ── Response parsing ────────────────────────────────────────────────────────

/// Lines that start with an ASCII digit, trimmed, at most `n`.
pub fn parse_numbered_lines(content: &str, n: usize) -> Vec<String> {
    content
        .lines()
        .filter(|line| line.starts_with(|c: char| c.is_ascii_digit()))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(n)
        .map(str::to_string)
        .collect()
}

/// The first line that is a bracketed JSON number array of `expected_len`
/// values. Lines that fail to parse or have the wrong length are passed over.
pub fn parse_probability_vector(content: &str, expected_len: usize) -> Option<Vec<f64>> {
    content.lines().map(str::trim).find_map(|line| {
        if !(line.starts_with('[') && line.ends_with(']')) {
            return None;
        }
        match serde_json::from_str::<Vec<f64>>(line) {
            Ok(v) if v.len() == expected_len => Some(v),
            Ok(v) => {
                debug!(got = v.len(), expected = expected_len, "probability vector length mismatch");
                None
            }
            Err(_) => None,
        }
    })
}

pub fn uniform(len: usize) -> Vec<f64> {
    vec![1.0 / len as f64; len]
}

/// `candidates` numbered from 1, then `truth` as the last option.
pub fn options_block(candidates: &[String], truth: &str) -> String {
    let mut block = numbered(candidates, 1);
    if !block.is_empty() {
        block.push('\n');
    }
    block.push_str(&format!("{}. {truth}", candidates.len() + 1));
    block
}

// ── Requests ────────────────────────────────────────────────────────────────

pub fn endings_request(prompts: &Prompts, begin: &str, n: usize) -> ChatRequest {
    let count = n.to_string();
    ChatRequest::user(prompts.render(Template::Endings, [("n", count.as_str()), ("begin", begin)]))
        .with_max_tokens(token_budget(TOKENS_PER_ITEM, n))
}

pub fn explanations_request(prompts: &Prompts, begin: &str, end: &str, n: usize) -> ChatRequest {
    let count = n.to_string();
    ChatRequest::user(prompts.render(
        Template::Explanations,
        [("n", count.as_str()), ("begin", begin), ("end", end)],
    ))
    .with_max_tokens(token_budget(TOKENS_PER_ITEM, n))
}

/// `per` tokens for each of `count` items, capped at `u32::MAX`.
fn token_budget(per: u32, count: usize) -> u32 {
    per.saturating_mul(u32::try_from(count).unwrap_or(u32::MAX))
}

fn prob_max_tokens(candidates: usize) -> u32 {
    token_budget(TOKENS_PER_OPTION, candidates.max(1))
}

pub fn ending_probs_request(
    prompts: &Prompts,
    begin: &str,
    end: &str,
    background: Option<&str>,
    endings: &[String],
) -> ChatRequest {
    let options = options_block(endings, end);
    let text = match background {
        Some(background) => prompts.render(
            Template::EndingProbsBackground,
            [("begin", begin), ("background", background), ("options", options.as_str())],
        ),
        None => prompts.render(Template::EndingProbs, [("begin", begin), ("options", options.as_str())]),
    };
    ChatRequest::user(text).with_max_tokens(prob_max_tokens(endings.len()))
}

pub fn explanation_probs_request(
    prompts: &Prompts,
    begin: &str,
    end: &str,
    explanations: &[String],
    answer: &str,
) -> ChatRequest {
    let options = options_block(explanations, answer);
    let text = prompts.render(
        Template::ExplanationProbs,
        [("begin", begin), ("end", end), ("options", options.as_str())],
    );
    ChatRequest::user(text).with_max_tokens(prob_max_tokens(explanations.len()))
}

// ── LLM round trips ─────────────────────────────────────────────────────────

/// Numbered list reply, or an empty list on failure.
pub async fn generate_list(llm: &LlmProvider, request: &ChatRequest, n: usize) -> Vec<String> {
    match llm.complete(request).await {
        Ok(content) => parse_numbered_lines(&content, n),
        Err(e) => {
            warn!(error = %e, "generation failed");
            Vec::new()
        }
    }
}

/// Up to three attempts at getting a vector of `expected_len` probabilities.
pub async fn request_probabilities(
    llm: &LlmProvider,
    request: &ChatRequest,
    expected_len: usize,
) -> Option<Vec<f64>> {
    for attempt in 1..=PROB_ATTEMPTS {
        match llm.complete(request).await {
            Ok(content) => {
                debug!(%content, "probability reply");
                if let Some(probs) = parse_probability_vector(&content, expected_len) {
                    return Some(probs);
                }
                warn!(attempt, "no probability vector found in response");
            }
            Err(e) => warn!(attempt, error = %e, "probability request failed"),
        }
    }
    None
}

// ── Jobs ────────────────────────────────────────────────────────────────────

/// Which list a generation pass fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Endings,
    Explanations,
}

impl ListKind {
    fn get(self, record: &StoryRecord) -> Option<&Vec<String>> {
        match self {
            ListKind::Endings => record.generated_endings.as_ref(),
            ListKind::Explanations => record.generated_explanations.as_ref(),
        }
    }

    fn slot(self, record: &mut StoryRecord) -> &mut Option<Vec<String>> {
        match self {
            ListKind::Endings => &mut record.generated_endings,
            ListKind::Explanations => &mut record.generated_explanations,
        }
    }

    fn request(self, prompts: &Prompts, begin: &str, end: &str, n: usize) -> ChatRequest {
        match self {
            ListKind::Endings => endings_request(prompts, begin, n),
            ListKind::Explanations => explanations_request(prompts, begin, end, n),
        }
    }
}

/// Fill `kind` for every complete story whose list is missing or empty,
/// calling `save` after each.
pub async fn fill_lists<F>(
    llm: &LlmProvider,
    prompts: &Prompts,
    kind: ListKind,
    n: usize,
    delay: Duration,
    records: &mut [StoryRecord],
    mut save: F,
) -> Result<usize, AppError>
where
    F: FnMut(&[StoryRecord]) -> Result<(), AppError>,
{
    let mut filled = 0;
    for i in 0..records.len() {
        let Some((begin, end)) = records[i].story() else {
            continue;
        };
        if kind.get(&records[i]).is_some_and(|l| !l.is_empty()) {
            continue;
        }
        info!(begin = %begin, ?kind, "generating");
        let request = kind.request(prompts, begin, end, n);
        let list = generate_list(llm, &request, n).await;
        *kind.slot(&mut records[i]) = Some(list);
        save(records)?;
        filled += 1;
        tokio::time::sleep(delay).await;
    }
    Ok(filled)
}

/// `ending-probs` over every record with a story and generated endings.
/// With `background`, records also need an `answer`.
pub async fn ending_probabilities<F>(
    llm: &LlmProvider,
    prompts: &Prompts,
    records: &[StoryRecord],
    background: bool,
    title: Option<&str>,
    delay: Duration,
    mut save: F,
) -> Result<Vec<EndingProbs>, AppError>
where
    F: FnMut(&[EndingProbs]) -> Result<(), AppError>,
{
    let mut results = Vec::new();
    for record in records {
        let (Some((begin, end)), Some(endings)) = (record.story(), record.generated_endings.as_ref())
        else {
            continue;
        };
        if title.is_some_and(|t| record.title.as_deref() != Some(t)) {
            continue;
        }
        let back = if background {
            let Some(answer) = record.answer.as_deref() else {
                warn!(begin = %begin, "no background answer, skipping");
                continue;
            };
            Some(answer)
        } else {
            None
        };

        let request = ending_probs_request(prompts, begin, end, back, endings);
        let expected = endings.len() + 1;
        let probs = match request_probabilities(llm, &request, expected).await {
            Some(p) => p,
            None => {
                warn!(begin = %begin, "failed to get a valid probability vector, using uniform");
                uniform(expected)
            }
        };
        info!(begin = %begin, ?probs, "probabilities");

        results.push(EndingProbs {
            begin_text: begin.to_string(),
            probs,
            generated_endings: endings.clone(),
            end_text: end.to_string(),
        });
        save(&results)?;
        tokio::time::sleep(delay).await;
    }
    Ok(results)
}

/// `explanation-probs` over every record with a story, explanations and an
/// answer.
pub async fn explanation_probabilities<F>(
    llm: &LlmProvider,
    prompts: &Prompts,
    records: &[StoryRecord],
    delay: Duration,
    mut save: F,
) -> Result<Vec<ExplanationProbs>, AppError>
where
    F: FnMut(&[ExplanationProbs]) -> Result<(), AppError>,
{
    let mut results = Vec::new();
    for record in records {
        let (Some((begin, end)), Some(explanations), Some(answer)) = (
            record.story(),
            record.generated_explanations.as_ref(),
            record.answer.as_deref(),
        ) else {
            continue;
        };

        let request = explanation_probs_request(prompts, begin, end, explanations, answer);
        let probs = request_probabilities(llm, &request, explanations.len() + 1).await;
        if probs.is_none() {
            warn!(begin = %begin, "failed to get a valid probability vector");
        }

        results.push(ExplanationProbs {
            begin_text: begin.to_string(),
            end_text: end.to_string(),
            generated_explanations: explanations.clone(),
            explanation_probs: probs,
            answer: answer.to_string(),
        });
        save(&results)?;
        tokio::time::sleep(delay).await;
    }
    Ok(results)
}

// ── Entry points ────────────────────────────────────────────────────────────

struct JobContext {
    llm: LlmProvider,
    prompts: Prompts,
    delay: Duration,
}

impl JobContext {
    fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            llm: llm::build(config)?,
            prompts: Prompts::new(config.workspace.prompts_dir()),
            delay: Duration::from_millis(config.llm.openrouter.request_delay_ms),
        })
    }
}

/// Load `output` when a previous run left it behind, else `input`.
fn load_resumable(input: &Path, output: &Path) -> Result<Vec<StoryRecord>, AppError> {
    if output.exists() {
        info!(path = %output.display(), "resuming");
        store::load_json(output)
    } else {
        store::load_json(input)
    }
}

/// `endings` and `explanations` jobs.
pub async fn run_lists(config: &Config, kind: ListKind) -> Result<(), AppError> {
    let ws = &config.workspace;
    let (input, output, n) = match kind {
        ListKind::Endings => (REWRITTEN_FILE, ENDINGS_FILE, config.generation.endings),
        ListKind::Explanations => (ENDINGS_FILE, EXPLANATIONS_FILE, config.generation.explanations),
    };
    let output = ws.data_file(output);
    let mut records = load_resumable(&ws.data_file(input), &output)?;

    let ctx = JobContext::new(config)?;
    let filled = fill_lists(&ctx.llm, &ctx.prompts, kind, n, ctx.delay, &mut records, |r| {
        store::save_json(&output, r)
    })
    .await?;
    store::save_json(&output, &records)?;

    println!("Generated {filled} lists. Saved to {}", output.display());
    Ok(())
}

/// `ending-probs` job.
pub async fn run_ending_probs(config: &Config, background: bool, title: Option<&str>) -> Result<(), AppError> {
    let ws = &config.workspace;
    let records: Vec<StoryRecord> = store::load_json(&ws.data_file(ENDINGS_FILE))?;
    let output = ws.data_file(if background { ENDING_PROBS_BACKGROUND_FILE } else { ENDING_PROBS_FILE });

    let ctx = JobContext::new(config)?;
    let results = ending_probabilities(
        &ctx.llm,
        &ctx.prompts,
        &records,
        background,
        title,
        ctx.delay,
        |r| store::save_json(&output, r),
    )
    .await?;

    println!("Probability calculation complete ({} stories). Saved to {}", results.len(), output.display());
    Ok(())
}

/// `explanation-probs` job.
pub async fn run_explanation_probs(config: &Config) -> Result<(), AppError> {
    let ws = &config.workspace;
    let records: Vec<StoryRecord> = store::load_json(&ws.data_file(EXPLANATIONS_FILE))?;
    let output = ws.data_file(EXPLANATION_PROBS_FILE);

    let ctx = JobContext::new(config)?;
    let results = explanation_probabilities(&ctx.llm, &ctx.prompts, &records, ctx.delay, |r| {
        store::save_json(&output, r)
    })
    .await?;
    store::save_json(&output, &results)?;

    println!(
        "Explanation probability calculation complete ({} stories). Saved to {}",
        results.len(),
        output.display()
    );
    Ok(())
}

//! `answers` job: have the LLM play host and answer every follow-up.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::followups::{FOLLOWUPS_FILE, FollowupMap};
use crate::llm::{self, ChatRequest, LlmProvider, RetryPolicy};
use crate::prompt::{Prompts, Template};
use crate::puzzle::Puzzle;
use crate::puzzle::corpus::PUZZLES_FILE;
use crate::store;

pub const ANSWERS_FILE: &str = "answers.json";

/// Recorded in place of a reply when every attempt failed.
pub const ANSWER_FAILED: &str = "回答失败";

const MAX_TOKENS: u32 = 200;

/// The host's reply class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostVerdict {
    Yes,
    No,
    Partly,
    Irrelevant,
    Other(String),
}

impl HostVerdict {
    /// Classify a host reply by its first `{…}` group. Replies without one
    /// are classified by their trimmed text.
    pub fn parse(text: &str) -> Self {
        let inner = braced(text).unwrap_or_else(|| text.trim());
        match inner {
            "是" => HostVerdict::Yes,
            "不是" => HostVerdict::No,
            "是也不是" => HostVerdict::Partly,
            "没有关系" => HostVerdict::Irrelevant,
            other => HostVerdict::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            HostVerdict::Yes => "是",
            HostVerdict::No => "不是",
            HostVerdict::Partly => "是也不是",
            HostVerdict::Irrelevant => "没有关系",
            HostVerdict::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for HostVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Content of the first `{…}` in `text`, trimmed.
pub fn braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let rest = &text[start + 1..];
    let end = rest.find('}')?;
    Some(rest[..end].trim())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleAnswers {
    pub title: String,
    pub questions: Vec<AnsweredQuestion>,
}

pub type AnswerMap = BTreeMap<String, PuzzleAnswers>;

pub fn build_request(prompts: &Prompts, puzzle: &Puzzle, followup: &str) -> ChatRequest {
    let text = prompts.render(
        Template::HostAnswer,
        [
            ("title", puzzle.title.as_str()),
            ("question", puzzle.question.as_str()),
            ("answer", puzzle.answer.as_str()),
            ("followup", followup),
        ],
    );
    ChatRequest::user(text).with_max_tokens(MAX_TOKENS)
}

/// Answer every follow-up of one puzzle. Failed questions are recorded with
/// [`ANSWER_FAILED`] and the error text.
pub async fn answer_puzzle(
    llm: &LlmProvider,
    prompts: &Prompts,
    policy: &RetryPolicy,
    delay: Duration,
    puzzle: &Puzzle,
    followups: &[String],
) -> PuzzleAnswers {
    let mut questions = Vec::with_capacity(followups.len());
    for followup in followups {
        let request = build_request(prompts, puzzle, followup);
        let entry = match llm.complete_with_retry(&request, policy).await {
            Ok(answer) => {
                debug!(question = %followup, verdict = %HostVerdict::parse(&answer), "answered");
                AnsweredQuestion { question: followup.clone(), answer, error: None }
            }
            Err(e) => {
                warn!(question = %followup, error = %e, "answer failed");
                AnsweredQuestion {
                    question: followup.clone(),
                    answer: ANSWER_FAILED.to_string(),
                    error: Some(e.to_string()),
                }
            }
        };
        questions.push(entry);
        tokio::time::sleep(delay).await;
    }
    PuzzleAnswers { title: puzzle.title.clone(), questions }
}

/// Answer every puzzle that has follow-ups and is not yet in `existing`.
#[allow(clippy::too_many_arguments)]
pub async fn fill<F>(
    llm: &LlmProvider,
    prompts: &Prompts,
    policy: &RetryPolicy,
    delay: Duration,
    puzzles: &[Puzzle],
    followups: &FollowupMap,
    existing: &mut AnswerMap,
    mut save: F,
) -> Result<usize, AppError>
where
    F: FnMut(&AnswerMap) -> Result<(), AppError>,
{
    let mut added = 0;
    for puzzle in puzzles {
        let Some(tries) = followups.get(&puzzle.filename) else {
            continue;
        };
        if existing.contains_key(&puzzle.filename) {
            debug!(file = %puzzle.filename, "already answered, skipping");
            continue;
        }
        info!(title = %puzzle.title, questions = tries.questions.len(), "answering");
        let answers = answer_puzzle(llm, prompts, policy, delay, puzzle, &tries.questions).await;
        existing.insert(puzzle.filename.clone(), answers);
        save(existing)?;
        added += 1;
    }
    Ok(added)
}

/// `answers` job.
pub async fn run(config: &Config) -> Result<(), AppError> {
    let ws = &config.workspace;
    let puzzles: Vec<Puzzle> = store::load_json(&ws.puzzles_file(PUZZLES_FILE))?;
    let followups: FollowupMap = store::load_json(&ws.puzzles_file(FOLLOWUPS_FILE))?;
    let out = ws.puzzles_file(ANSWERS_FILE);
    let mut map: AnswerMap = store::load_json_or_default(&out)?;

    let llm = llm::build(config)?;
    let prompts = Prompts::new(ws.prompts_dir());
    let policy = RetryPolicy::from_config(&config.llm.openrouter);
    let delay = Duration::from_millis(config.llm.openrouter.request_delay_ms);

    let added = fill(
        &llm,
        &prompts,
        &policy,
        delay,
        &puzzles,
        &followups,
        &mut map,
        |m| store::save_json(&out, m),
    )
    .await?;

    info!(added, total = map.len(), path = %out.display(), "answers saved");
    println!("所有问题已回答，结果已保存到 {}", out.display());
    Ok(())
}

//! `followups` job: ask the LLM for yes/no follow-up questions per puzzle.
//!
//! Output is `puzzles/followups.json`, a map `filename → { "try": [...] }`.
//! Finished puzzles are skipped on rerun and the file is rewritten after
//! every puzzle.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::{self, ChatRequest, LlmProvider};
use crate::prompt::{Prompts, Template};
use crate::puzzle::Puzzle;
use crate::puzzle::corpus::PUZZLES_FILE;
use crate::store;

pub const FOLLOWUPS_FILE: &str = "followups.json";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Followups {
    #[serde(rename = "try")]
    pub questions: Vec<String>,
}

pub type FollowupMap = BTreeMap<String, Followups>;

/// Non-empty trimmed lines of `content`, at most `n`.
pub fn parse_followups(content: &str, n: usize) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(n)
        .map(str::to_string)
        .collect()
}

/// Stand-in questions recorded when the LLM call fails.
pub fn placeholder_questions(question: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("关于'{question}'的追问问题{i}")).collect()
}

pub fn build_request(prompts: &Prompts, question: &str, n: usize) -> ChatRequest {
    let n = n.to_string();
    ChatRequest::user(prompts.render(Template::Followups, [("n", n.as_str()), ("question", question)]))
        .with_system(prompts.text(Template::FollowupsSystem))
        .with_temperature(TEMPERATURE)
        .with_max_tokens(MAX_TOKENS)
}

/// Follow-ups for one puzzle question. Never fails: errors fall back to
/// [`placeholder_questions`].
pub async fn generate(llm: &LlmProvider, prompts: &Prompts, question: &str, n: usize) -> Vec<String> {
    match llm.complete(&build_request(prompts, question, n)).await {
        Ok(content) => parse_followups(&content, n),
        Err(e) => {
            warn!(error = %e, "follow-up generation failed, using placeholders");
            placeholder_questions(question, n)
        }
    }
}

/// Generate follow-ups for every puzzle not yet in `existing`, calling
/// `save` after each one.
pub async fn fill<F>(
    llm: &LlmProvider,
    prompts: &Prompts,
    puzzles: &[Puzzle],
    n: usize,
    delay: Duration,
    existing: &mut FollowupMap,
    mut save: F,
) -> Result<usize, AppError>
where
    F: FnMut(&FollowupMap) -> Result<(), AppError>,
{
    let mut added = 0;
    for puzzle in puzzles {
        if existing.contains_key(&puzzle.filename) {
            continue;
        }
        let questions = generate(llm, prompts, &puzzle.question, n).await;
        info!(file = %puzzle.filename, count = questions.len(), "follow-ups generated");
        existing.insert(puzzle.filename.clone(), Followups { questions });
        save(existing)?;
        added += 1;
        tokio::time::sleep(delay).await;
    }
    Ok(added)
}

/// `followups` job.
pub async fn run(config: &Config) -> Result<(), AppError> {
    let ws = &config.workspace;
    let puzzles: Vec<Puzzle> = store::load_json(&ws.puzzles_file(PUZZLES_FILE))?;
    let out = ws.puzzles_file(FOLLOWUPS_FILE);
    let mut map: FollowupMap = store::load_json_or_default(&out)?;
    let skipped = map.len();

    let llm = llm::build(config)?;
    let prompts = Prompts::new(ws.prompts_dir());
    let delay = Duration::from_millis(config.llm.openrouter.request_delay_ms);

    let added = fill(
        &llm,
        &prompts,
        &puzzles,
        config.generation.followups,
        delay,
        &mut map,
        |m| store::save_json(&out, m),
    )
    .await?;

    info!(added, skipped, path = %out.display(), "follow-ups saved");
    println!("已为{}个谜题生成追问问题，保存到{}", map.len(), out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;

    fn puzzle(name: &str, q: &str) -> Puzzle {
        Puzzle {
            filename: name.into(),
            title: name.trim_end_matches(".md").into(),
            question: q.into(),
            answer: "a".into(),
            note: crate::puzzle::NO_NOTE.into(),
        }
    }

    #[test]
    fn parse_drops_blank_lines_and_truncates() {
        let content = "  他是故意的吗？\n\n他认识死者吗？\n 现场有第三人吗？ \n";
        assert_eq!(parse_followups(content, 2), vec!["他是故意的吗？", "他认识死者吗？"]);
        assert_eq!(parse_followups(content, 10).len(), 3);
    }

    #[test]
    fn placeholders_are_numbered_from_one() {
        let p = placeholder_questions("谁", 2);
        assert_eq!(p, vec!["关于'谁'的追问问题1", "关于'谁'的追问问题2"]);
    }

    #[test]
    fn request_has_system_prompt_and_limits() {
        let prompts = Prompts::new("/nonexistent");
        let req = build_request(&prompts, "一个人死了", 5);
        assert_eq!(req.messages.len(), 2);
        assert!(req.messages[0].content.contains("海龟汤游戏助手"));
        assert!(req.messages[1].content.contains("5个"));
        assert!(req.messages[1].content.contains("一个人死了"));
        assert_eq!(req.temperature, Some(0.7));
        assert_eq!(req.max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn failure_falls_back_to_placeholders() {
        let llm = LlmProvider::Dummy(DummyProvider::scripted([Err("503")]));
        let prompts = Prompts::new("/nonexistent");
        let out = generate(&llm, &prompts, "q", 3).await;
        assert_eq!(out.len(), 3);
        assert!(out[0].starts_with("关于'q'"));
    }

    #[tokio::test]
    async fn fill_skips_existing_and_saves_each_time() {
        let dummy = DummyProvider::scripted([Ok("问1\n问2")]);
        let llm = LlmProvider::Dummy(dummy.clone());
        let prompts = Prompts::new("/nonexistent");
        let puzzles = vec![puzzle("a.md", "qa"), puzzle("b.md", "qb")];

        let mut map = FollowupMap::new();
        map.insert("a.md".into(), Followups { questions: vec!["old".into()] });

        let mut saves = 0;
        let added = fill(&llm, &prompts, &puzzles, 10, Duration::ZERO, &mut map, |_| {
            saves += 1;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(added, 1);
        assert_eq!(saves, 1);
        assert_eq!(dummy.calls(), 1);
        assert_eq!(map["a.md"].questions, vec!["old"]);
        assert_eq!(map["b.md"].questions, vec!["问1", "问2"]);
    }

    #[test]
    fn serializes_under_try_key() {
        let f = Followups { questions: vec!["x".into()] };
        assert_eq!(serde_json::to_string(&f).unwrap(), r#"{"try":["x"]}"#);
    }
}

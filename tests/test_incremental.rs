//! Resumable jobs: an interrupted run picks up where it stopped.

use std::time::Duration;

use tempfile::TempDir;

use haigui::answers::{self, ANSWER_FAILED, AnswerMap, PuzzleAnswers};
use haigui::error::AppError;
use haigui::followups::{self, FollowupMap, Followups};
use haigui::llm::providers::dummy::DummyProvider;
use haigui::llm::{LlmProvider, RetryPolicy};
use haigui::logprob::jobs::score_yesno_incremental;
use haigui::logprob::{CausalLm, LmError, LogprobFile, TokenId};
use haigui::prompt::Prompts;
use haigui::puzzle::{NO_NOTE, Puzzle};
use haigui::store;

// ── helpers ──────────────────────────────────────────────────────────────────

fn puzzle(name: &str) -> Puzzle {
    Puzzle {
        filename: format!("{name}.md"),
        title: name.to_string(),
        question: format!("{name}的汤面"),
        answer: format!("{name}的汤底"),
        note: NO_NOTE.to_string(),
    }
}

fn prompts() -> Prompts {
    Prompts::new("/nonexistent")
}

/// Uniform next-token model over a small vocabulary. Every continuation
/// token scores `-ln(vocab)`. Sequences longer than `context` fail.
struct FlatLm {
    vocab: u32,
    context: usize,
}

impl CausalLm for FlatLm {
    fn tokenize(&self, text: &str, add_bos: bool) -> Result<Vec<TokenId>, LmError> {
        let mut out = Vec::new();
        if add_bos {
            out.push(0);
        }
        out.extend(text.chars().map(|c| 1 + c as u32 % (self.vocab - 1)));
        Ok(out)
    }

    fn logits(&mut self, tokens: &[TokenId]) -> Result<Vec<Vec<f32>>, LmError> {
        if tokens.len() > self.context {
            return Err(LmError::TooLong { tokens: tokens.len(), context: self.context });
        }
        Ok(vec![vec![0.0; self.vocab as usize]; tokens.len()])
    }
}

// ── follow-ups ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn followups_resume_after_failed_save() {
    let llm = LlmProvider::Dummy(DummyProvider::scripted([Ok("问题一？\n问题二？"), Ok("问题三？")]));
    let puzzles = vec![puzzle("甲"), puzzle("乙")];
    let mut map = FollowupMap::new();

    // The second save fails, as if the process died there.
    let mut saves = 0;
    let result = followups::fill(&llm, &prompts(), &puzzles, 5, Duration::ZERO, &mut map, |_| {
        saves += 1;
        if saves == 2 { Err(AppError::Usage("disk full".into())) } else { Ok(()) }
    })
    .await;
    assert!(result.is_err());

    // Only what reached disk counts.
    let mut resumed = FollowupMap::new();
    resumed.insert("甲.md".into(), map["甲.md"].clone());

    let dummy = DummyProvider::scripted([Ok("新问题？")]);
    let llm = LlmProvider::Dummy(dummy.clone());
    let added = followups::fill(&llm, &prompts(), &puzzles, 5, Duration::ZERO, &mut resumed, |_| Ok(()))
        .await
        .unwrap();

    assert_eq!(added, 1);
    assert_eq!(dummy.calls(), 1);
    assert_eq!(resumed["甲.md"].questions, vec!["问题一？", "问题二？"]);
    assert_eq!(resumed["乙.md"].questions, vec!["新问题？"]);
}

// ── answers ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn answers_skip_done_puzzles_and_record_failures() {
    let puzzles = vec![puzzle("甲"), puzzle("乙"), puzzle("丙")];
    let mut followups = FollowupMap::new();
    followups.insert("甲.md".into(), Followups { questions: vec!["旧问题？".into()] });
    followups.insert("乙.md".into(), Followups { questions: vec!["是人为的吗？".into(), "有第三人吗？".into()] });

    let mut existing = AnswerMap::new();
    existing.insert("甲.md".into(), PuzzleAnswers { title: "甲".into(), questions: vec![] });

    let dummy = DummyProvider::scripted([Ok("{是}"), Err("502")]);
    let llm = LlmProvider::Dummy(dummy.clone());
    let policy = RetryPolicy { attempts: 1, delay: Duration::ZERO };

    let added = answers::fill(
        &llm,
        &prompts(),
        &policy,
        Duration::ZERO,
        &puzzles,
        &followups,
        &mut existing,
        |_| Ok(()),
    )
    .await
    .unwrap();

    assert_eq!(added, 1);
    assert_eq!(dummy.calls(), 2);
    assert!(existing["甲.md"].questions.is_empty());
    assert!(!existing.contains_key("丙.md"));

    let answered = &existing["乙.md"].questions;
    assert_eq!(answered[0].answer, "{是}");
    assert_eq!(answered[0].error, None);
    assert_eq!(answered[1].answer, ANSWER_FAILED);
    assert!(answered[1].error.as_deref().is_some_and(|e| e.contains("502")));
}

// ── yes/no log-probabilities ─────────────────────────────────────────────────

#[test]
fn yesno_scoring_skips_known_ids_and_saves_each_item() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("yesno_puzzle_logprobs.json");
    let mut lm = FlatLm { vocab: 8, context: 64 };

    let pairs = vec![
        ("ab".to_string(), "c".to_string()),
        ("de".to_string(), "fg".to_string()),
        ("h".to_string(), "ijk".to_string()),
    ];

    // First run stops after one item.
    let mut first = LogprobFile::default();
    score_yesno_incremental(&mut lm, &pairs[..1], &mut first, |o| store::save_json(&path, o)).unwrap();

    let mut output: LogprobFile = store::load_json_or_default(&path).unwrap();
    let mut saves = 0;
    let added = score_yesno_incremental(&mut lm, &pairs, &mut output, |o| {
        saves += 1;
        store::save_json(&path, o)
    })
    .unwrap();

    assert_eq!(added, 2);
    assert_eq!(saves, 3);
    let ids: Vec<_> = output.puzzles.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![Some(0), Some(1), Some(2)]);

    let ln8 = 8f64.ln();
    let third = &output.puzzles[2].logprobs;
    assert!((third.answer_given_puzzle - -3.0 * ln8).abs() < 1e-9);
    assert!((third.puzzle_given_empty - -ln8).abs() < 1e-9);
    assert!(third.answer_prompt_effect.abs() < 1e-9);

    let on_disk: LogprobFile = store::load_json(&path).unwrap();
    assert_eq!(on_disk, output);
    let expected_total = -(1.0 + 2.0 + 3.0) * ln8;
    assert!((on_disk.statistics.total_answer_given_puzzle - expected_total).abs() < 1e-9);
    assert!((on_disk.statistics.avg_answer_given_puzzle - expected_total / 3.0).abs() < 1e-9);
}

#[test]
fn yesno_scoring_skips_overlong_pairs() {
    let mut lm = FlatLm { vocab: 8, context: 6 };
    let pairs = vec![
        ("ab".to_string(), "c".to_string()),
        ("a very long puzzle".to_string(), "answer".to_string()),
    ];
    let mut output = LogprobFile::default();
    let added = score_yesno_incremental(&mut lm, &pairs, &mut output, |_| Ok(())).unwrap();
    assert_eq!(added, 1);
    assert_eq!(output.puzzles[0].id, Some(0));
}

#[test]
fn empty_run_keeps_zero_statistics() {
    let mut lm = FlatLm { vocab: 4, context: 8 };
    let mut output = LogprobFile::default();
    let added = score_yesno_incremental(&mut lm, &[], &mut output, |_| Ok(())).unwrap();
    assert_eq!(added, 0);
    assert_eq!(output.statistics.avg_puzzle_given_answer, 0.0);
}

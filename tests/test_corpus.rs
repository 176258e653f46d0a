//! Offline end-to-end run of the markdown corpus jobs.
//!
//! Uses the dummy LLM provider, so no network or API key is needed.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use haigui::answers::{ANSWERS_FILE, AnswerMap};
use haigui::config::Config;
use haigui::followups::{FOLLOWUPS_FILE, FollowupMap};
use haigui::puzzle::corpus::{self, PUZZLES_FILE};
use haigui::puzzle::{NO_NOTE, Puzzle};
use haigui::store;

// ── helpers ──────────────────────────────────────────────────────────────────

fn workspace() -> (TempDir, Config) {
    let tmp = TempDir::new().expect("tempdir");
    let config = Config::offline(tmp.path());
    fs::create_dir_all(config.workspace.puzzles_dir()).expect("create puzzles dir");
    (tmp, config)
}

fn write_puzzle(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write puzzle");
}

fn seed(config: &Config) {
    let dir = config.workspace.puzzles_dir();
    write_puzzle(
        &dir,
        "半根火柴.md",
        "### 汤面\n一个人死在沙漠里，手里握着半根火柴。\n\n### 汤底\n热气球超重，抽签跳下。\n\n### 附加说明\n经典。\n",
    );
    write_puzzle(&dir, "海龟汤.md", "### 汤面\n他喝了一口海龟汤就自杀了。\n### 汤底\n他发现当年吃的不是海龟汤。\n");
    write_puzzle(&dir, "README.txt", "not a puzzle");
}

// ── tests ────────────────────────────────────────────────────────────────────

#[test]
fn corpus_writes_sorted_puzzles_json() {
    let (_tmp, config) = workspace();
    seed(&config);

    let puzzles = corpus::run(&config).expect("corpus");
    assert_eq!(puzzles.len(), 2);

    let saved: Vec<Puzzle> = store::load_json(&config.workspace.puzzles_file(PUZZLES_FILE)).unwrap();
    assert_eq!(saved, puzzles);
    assert_eq!(saved[0].filename, "半根火柴.md");
    assert_eq!(saved[0].title, "半根火柴");
    assert_eq!(saved[0].note, "经典。");
    assert_eq!(saved[1].note, NO_NOTE);

    // Non-ASCII text is written as-is.
    let raw = fs::read_to_string(config.workspace.puzzles_file(PUZZLES_FILE)).unwrap();
    assert!(raw.contains("热气球超重"));
}

#[test]
fn corpus_fails_without_puzzle_dir() {
    let tmp = TempDir::new().unwrap();
    let config = Config::offline(tmp.path());
    assert!(corpus::run(&config).is_err());
}

#[tokio::test]
async fn followups_then_answers_offline() {
    let (_tmp, config) = workspace();
    seed(&config);
    corpus::run(&config).unwrap();

    haigui::followups::run(&config).await.expect("followups");
    let followups: FollowupMap = store::load_json(&config.workspace.puzzles_file(FOLLOWUPS_FILE)).unwrap();
    assert_eq!(followups.len(), 2);
    assert!(followups.values().all(|f| !f.questions.is_empty()));

    haigui::answers::run(&config).await.expect("answers");
    let answers: AnswerMap = store::load_json(&config.workspace.puzzles_file(ANSWERS_FILE)).unwrap();
    assert_eq!(answers.len(), 2);
    let entry = &answers["海龟汤.md"];
    assert_eq!(entry.title, "海龟汤");
    assert_eq!(entry.questions.len(), followups["海龟汤.md"].questions.len());
    assert!(entry.questions.iter().all(|q| q.answer.starts_with("[echo]")));
}

#[tokio::test]
async fn answers_need_followups_file() {
    let (_tmp, config) = workspace();
    seed(&config);
    corpus::run(&config).unwrap();
    assert!(haigui::answers::run(&config).await.is_err());
}

//! `logprob md` and `logprob yesno`.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::puzzle::corpus::list_markdown_files;
use crate::puzzle::markdown::split_surface_and_base;
use crate::scrape::YESNO_FILE;
use crate::store;

use super::{CausalLm, LmError, LogprobFile, ScoredPuzzle, analyze_pair};

pub const MD_LOGPROBS_FILE: &str = "puzzle_logprobs.json";
pub const YESNO_LOGPROBS_FILE: &str = "yesno_puzzle_logprobs.json";

/// Which corpus to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Markdown,
    YesNo,
}

impl Source {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "md" | "markdown" => Some(Source::Markdown),
            "yesno" => Some(Source::YesNo),
            _ => None,
        }
    }
}

/// Score one pair, skipping (with a warning) inputs too long for the model.
fn score<M: CausalLm + ?Sized>(
    lm: &mut M,
    label: &str,
    puzzle: &str,
    answer: &str,
) -> Result<Option<super::LogprobReport>, AppError> {
    match analyze_pair(lm, puzzle, answer) {
        Ok(report) => Ok(Some(report)),
        Err(e @ LmError::TooLong { .. }) => {
            warn!(puzzle = %label, error = %e, "skipping");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Score every markdown puzzle in `dir`.
pub fn score_markdown<M: CausalLm + ?Sized>(lm: &mut M, dir: &Path) -> Result<LogprobFile, AppError> {
    let mut puzzles = Vec::new();
    for path in list_markdown_files(dir)? {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(&path)?;
        let (puzzle_text, answer_text) = split_surface_and_base(&content);

        let Some(logprobs) = score(lm, &file, &puzzle_text, &answer_text)? else {
            continue;
        };
        info!(
            file = %file,
            answer_given_puzzle = logprobs.answer_given_puzzle,
            puzzle_given_answer = logprobs.puzzle_given_answer,
            "scored"
        );
        puzzles.push(ScoredPuzzle { id: None, file: Some(file), puzzle_text, answer_text, logprobs });
    }
    Ok(LogprobFile::from_puzzles(puzzles))
}

/// `(question, answer)` of every record that is an object with both keys as
/// strings. The pair's index in the returned list is its id.
pub fn yesno_pairs(records: &[Value]) -> Vec<(String, String)> {
    records
        .iter()
        .filter_map(|r| {
            let q = r.get("question")?.as_str()?;
            let a = r.get("answer")?.as_str()?;
            Some((q.to_string(), a.to_string()))
        })
        .collect()
}

/// Score pairs whose id is not yet in `output`, calling `save` after each.
/// Statistics are recomputed over the whole list at the end.
pub fn score_yesno_incremental<M, F>(
    lm: &mut M,
    pairs: &[(String, String)],
    output: &mut LogprobFile,
    mut save: F,
) -> Result<usize, AppError>
where
    M: CausalLm + ?Sized,
    F: FnMut(&LogprobFile) -> Result<(), AppError>,
{
    let done: std::collections::HashSet<usize> = output.puzzles.iter().filter_map(|p| p.id).collect();
    let mut added = 0;

    for (idx, (puzzle_text, answer_text)) in pairs.iter().enumerate() {
        if done.contains(&idx) {
            continue;
        }
        let Some(logprobs) = score(lm, &idx.to_string(), puzzle_text, answer_text)? else {
            continue;
        };
        info!(id = idx, answer_given_puzzle = logprobs.answer_given_puzzle, "scored");
        output.puzzles.push(ScoredPuzzle {
            id: Some(idx),
            file: None,
            puzzle_text: puzzle_text.clone(),
            answer_text: answer_text.clone(),
            logprobs,
        });
        added += 1;
        save(output)?;
    }

    output.refresh_statistics();
    save(output)?;
    Ok(added)
}

pub fn output_path(config: &Config, source: Source) -> PathBuf {
    match source {
        Source::Markdown => config.workspace.puzzles_file(MD_LOGPROBS_FILE),
        Source::YesNo => config.workspace.data_file(YESNO_LOGPROBS_FILE),
    }
}

/// Run either job against an already loaded model.
pub fn run_with<M: CausalLm + ?Sized>(
    config: &Config,
    source: Source,
    lm: &mut M,
) -> Result<(), AppError> {
    let out = output_path(config, source);
    match source {
        Source::Markdown => {
            let file = score_markdown(lm, &config.workspace.puzzles_dir())?;
            store::save_json(&out, &file)?;
            println!("分析完成，{} 个谜题，结果已保存到 {}", file.puzzles.len(), out.display());
        }
        Source::YesNo => {
            let records: Vec<Value> = store::load_json(&config.workspace.data_file(YESNO_FILE))?;
            let pairs = yesno_pairs(&records);
            let mut output: LogprobFile = store::load_json_or_default(&out)?;
            let added = score_yesno_incremental(lm, &pairs, &mut output, |o| store::save_json(&out, o))?;
            println!(
                "Processed {added} new puzzles. Total puzzles: {}\nResults saved to {}",
                output.puzzles.len(),
                out.display()
            );
        }
    }
    Ok(())
}

/// `logprob` job: load the configured local model and score `source`.
pub fn run(config: &Config, source: Source) -> Result<(), AppError> {
    #[cfg(feature = "llama")]
    {
        let mut lm = super::llama::LlamaLm::load(&config.logprob)?;
        run_with(config, source, &mut lm)
    }
    #[cfg(not(feature = "llama"))]
    {
        let _ = (config, source);
        Err(LmError::BackendDisabled.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logprob::testing::ToyLm;

    #[test]
    fn yesno_pairs_filters_malformed_records() {
        let records = vec![
            serde_json::json!({ "question": "q0", "answer": "a0", "rating": "4" }),
            serde_json::json!({ "question": "no answer" }),
            serde_json::json!("not an object"),
            serde_json::json!({ "question": "q1", "answer": "a1" }),
        ];
        assert_eq!(
            yesno_pairs(&records),
            vec![("q0".to_string(), "a0".to_string()), ("q1".to_string(), "a1".to_string())]
        );
    }

    #[test]
    fn markdown_scoring_uses_substring_split() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "### 汤面\nab\n### 汤底\nba\n### 附加说明\nx").unwrap();
        std::fs::write(dir.path().join("a.md"), "### 汤面\na\n### 汤底\nb").unwrap();

        let mut lm = ToyLm::uniform(4);
        let file = score_markdown(&mut lm, dir.path()).unwrap();
        assert_eq!(file.puzzles.len(), 2);
        assert_eq!(file.puzzles[0].file.as_deref(), Some("a.md"));
        assert_eq!(file.puzzles[1].puzzle_text, "ab");
        assert_eq!(file.puzzles[1].answer_text, "ba");

        let expected = -(4f64.ln()) * 3.0; // 1 + 2 answer tokens
        assert!((file.statistics.total_answer_given_puzzle - expected).abs() < 1e-9);
    }

    #[test]
    fn incremental_skips_known_ids_and_keeps_them() {
        let pairs = vec![("q0".into(), "a0".into()), ("q1".into(), "a1".into())];
        let mut lm = ToyLm::uniform(4);

        let mut first = LogprobFile::default();
        score_yesno_incremental(&mut lm, &pairs[..1], &mut first, |_| Ok(())).unwrap();
        assert_eq!(first.puzzles.len(), 1);
        let calls_after_first = lm.forward_calls;

        let mut saved = Vec::new();
        let added = score_yesno_incremental(&mut lm, &pairs, &mut first, |o| {
            saved.push(o.puzzles.len());
            Ok(())
        })
        .unwrap();

        assert_eq!(added, 1);
        assert_eq!(lm.forward_calls - calls_after_first, 4);
        assert_eq!(saved, vec![2, 2]);
        assert_eq!(first.puzzles.iter().map(|p| p.id).collect::<Vec<_>>(), vec![Some(0), Some(1)]);
        assert!((first.statistics.avg_answer_given_puzzle - (-2.0 * 4f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn source_names() {
        assert_eq!(Source::parse("md"), Some(Source::Markdown));
        assert_eq!(Source::parse("yesno"), Some(Source::YesNo));
        assert_eq!(Source::parse("csv"), None);
    }

    #[cfg(not(feature = "llama"))]
    #[test]
    fn run_without_backend_is_a_clear_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::offline(dir.path());
        let err = run(&config, Source::Markdown).unwrap_err();
        assert!(err.to_string().contains("--features llama"));
    }
}

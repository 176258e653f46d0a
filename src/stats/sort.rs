//! `sort` job: rank markdown puzzles by how much the question helps the
//! model predict the answer.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::logprob::jobs::MD_LOGPROBS_FILE;
use crate::logprob::{LogprobFile, ScoredPuzzle};
use crate::store;

use super::StatsError;

pub const SORTED_FILE: &str = "sorted_puzzles.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedPuzzle {
    #[serde(flatten)]
    pub puzzle: ScoredPuzzle,
    /// `answer_given_puzzle - answer_given_empty`.
    pub calculated_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SortStatistics {
    pub min_value: f64,
    pub max_value: f64,
    pub avg_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedFile {
    pub sorted_puzzles: Vec<SortedPuzzle>,
    pub statistics: SortStatistics,
}

/// Attach `calculated_value`, sort ascending (stable), and summarise.
pub fn sort_puzzles(puzzles: Vec<ScoredPuzzle>) -> Result<SortedFile, StatsError> {
    if puzzles.is_empty() {
        return Err(StatsError::Empty);
    }

    let mut sorted: Vec<SortedPuzzle> = puzzles
        .into_iter()
        .map(|puzzle| {
            let calculated_value = puzzle.logprobs.answer_given_puzzle - puzzle.logprobs.answer_given_empty;
            SortedPuzzle { puzzle, calculated_value }
        })
        .collect();
    sorted.sort_by(|a, b| a.calculated_value.total_cmp(&b.calculated_value));

    let values = sorted.iter().map(|p| p.calculated_value);
    let statistics = SortStatistics {
        min_value: values.clone().fold(f64::INFINITY, f64::min),
        max_value: values.clone().fold(f64::NEG_INFINITY, f64::max),
        avg_value: values.sum::<f64>() / sorted.len() as f64,
    };

    Ok(SortedFile { sorted_puzzles: sorted, statistics })
}

/// `sort` job.
pub fn run(config: &Config) -> Result<(), AppError> {
    let input = config.workspace.puzzles_file(MD_LOGPROBS_FILE);
    let output = config.workspace.puzzles_file(SORTED_FILE);

    let result = store::load_json::<LogprobFile>(&input)
        .and_then(|file| sort_puzzles(file.puzzles).map_err(AppError::from))
        .and_then(|sorted| store::save_json(&output, &sorted).map(|_| sorted));

    match result {
        Ok(sorted) => {
            info!(count = sorted.sorted_puzzles.len(), "puzzles sorted");
            println!("Successfully sorted and saved puzzles to {}", output.display());
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "error processing puzzles");
            Err(e)
        }
    }
}

//! `regress` job: how text length relates to the log-probability scores of
//! the yes/no corpus.

use std::fmt::Write as _;

use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::logprob::jobs::YESNO_LOGPROBS_FILE;
use crate::logprob::{LogprobFile, ScoredPuzzle};
use crate::store;

use super::{Regression, StatsError, format_sig4, linregress, plot};

pub const PLOT_FILE: &str = "logprob_regression.png";

/// One fitted panel: the data it was fitted on plus labels.
#[derive(Debug, Clone)]
pub struct Panel {
    pub heading: &'static str,
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub points: Vec<(f64, f64)>,
    pub fit: Regression,
}

struct PanelDef {
    heading: &'static str,
    title: &'static str,
    x_label: &'static str,
    y_label: &'static str,
    x: fn(&ScoredPuzzle) -> f64,
    y: fn(&ScoredPuzzle) -> f64,
}

fn puzzle_len(p: &ScoredPuzzle) -> f64 {
    p.puzzle_text.chars().count() as f64
}

fn answer_len(p: &ScoredPuzzle) -> f64 {
    p.answer_text.chars().count() as f64
}

fn puzzle_given_answer(p: &ScoredPuzzle) -> f64 {
    p.logprobs.puzzle_given_answer
}

fn answer_given_puzzle(p: &ScoredPuzzle) -> f64 {
    p.logprobs.answer_given_puzzle
}

fn answer_prompt_effect(p: &ScoredPuzzle) -> f64 {
    p.logprobs.answer_prompt_effect
}

fn puzzle_prompt_effect(p: &ScoredPuzzle) -> f64 {
    p.logprobs.puzzle_prompt_effect
}

const PANELS: [PanelDef; 4] = [
    PanelDef {
        heading: "Puzzle Regression Results:",
        title: "Puzzle Text Length vs Logprob",
        x_label: "Puzzle Text Length",
        y_label: "Puzzle Given Answer Logprob",
        x: puzzle_len,
        y: puzzle_given_answer,
    },
    PanelDef {
        heading: "Answer Regression Results:",
        title: "Answer Text Length vs Logprob",
        x_label: "Answer Text Length",
        y_label: "Answer Given Puzzle Logprob",
        x: answer_len,
        y: answer_given_puzzle,
    },
    PanelDef {
        heading: "Answer Prompt Effect Regression Results:",
        title: "Answer Length vs Prompt Effect",
        x_label: "Answer Text Length",
        y_label: "Answer Prompt Effect",
        x: answer_len,
        y: answer_prompt_effect,
    },
    PanelDef {
        heading: "Puzzle Prompt Effect Regression Results:",
        title: "Puzzle Length vs Prompt Effect",
        x_label: "Puzzle Text Length",
        y_label: "Puzzle Prompt Effect",
        x: puzzle_len,
        y: puzzle_prompt_effect,
    },
];

/// Fit the four panels. Lengths are counted in characters.
pub fn analyze(puzzles: &[ScoredPuzzle]) -> Result<Vec<Panel>, StatsError> {
    PANELS
        .iter()
        .map(|def| {
            let points: Vec<(f64, f64)> = puzzles.iter().map(|p| ((def.x)(p), (def.y)(p))).collect();
            let (x, y): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
            let fit = linregress(&x, &y)?;
            Ok(Panel {
                heading: def.heading,
                title: def.title,
                x_label: def.x_label,
                y_label: def.y_label,
                points,
                fit,
            })
        })
        .collect()
}

/// Plain-text report, one block per panel.
pub fn report(panels: &[Panel]) -> String {
    let mut out = String::new();
    for (i, panel) in panels.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let f = &panel.fit;
        let _ = writeln!(out, "{}", panel.heading);
        let _ = writeln!(out, "Slope: {:.4}, Intercept: {:.4}", f.slope, f.intercept);
        let _ = writeln!(out, "R-squared: {:.4}, p-value: {}", f.r_squared(), format_sig4(f.p_value));
    }
    out
}

/// `regress` job.
pub fn run(config: &Config, with_plot: bool) -> Result<(), AppError> {
    let path = config.workspace.data_file(YESNO_LOGPROBS_FILE);
    let file: LogprobFile = store::load_json(&path)?;
    let panels = analyze(&file.puzzles)?;
    info!(puzzles = file.puzzles.len(), "regressions fitted");

    if with_plot {
        let out = config.workspace.data_file(PLOT_FILE);
        plot::regression_grid(&panels, &out)?;
    }
    print!("{}", report(&panels));
    Ok(())
}

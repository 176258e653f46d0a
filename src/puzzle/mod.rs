//! Markdown puzzle corpus.
//!
//! - **markdown**: section extraction from a single file.
//! - **corpus**: directory walking and the `corpus` job.

pub mod corpus;
pub mod markdown;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use markdown::{MISSING_CONTENT, NO_NOTE, PuzzleSections, extract_sections};

/// One entry of `puzzles/puzzles.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub filename: String,
    pub title: String,
    pub question: String,
    pub answer: String,
    pub note: String,
}

impl Puzzle {
    pub fn from_sections(filename: &str, sections: PuzzleSections) -> Self {
        Self {
            filename: filename.to_string(),
            title: title_from_filename(filename),
            question: sections.question,
            answer: sections.answer,
            note: sections.note,
        }
    }
}

/// File name without its `.md` extension.
pub fn title_from_filename(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

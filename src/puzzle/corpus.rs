//! Walk the markdown puzzle directory and build `puzzles/puzzles.json`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::store;

use super::{Puzzle, extract_sections};

pub const PUZZLES_FILE: &str = "puzzles.json";

/// `*.md` files directly inside `dir`, sorted by file name.
pub fn list_markdown_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot read puzzle directory {}: {e}", dir.display()),
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read one markdown file and turn it into a [`Puzzle`].
pub fn load_puzzle_file(path: &Path) -> Result<Puzzle, AppError> {
    let content = fs::read_to_string(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let sections = extract_sections(&content);
    if !sections.is_complete() {
        warn!(file = %filename, "puzzle is missing its question or answer");
    }
    Ok(Puzzle::from_sections(&filename, sections))
}

/// Parse every markdown puzzle in `dir`. Unreadable files are logged and
/// skipped.
pub fn build_corpus(dir: &Path) -> Result<Vec<Puzzle>, AppError> {
    let mut puzzles = Vec::new();
    for path in list_markdown_files(dir)? {
        match load_puzzle_file(&path) {
            Ok(p) => puzzles.push(p),
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable puzzle"),
        }
    }
    Ok(puzzles)
}

/// `corpus` job.
pub fn run(config: &Config) -> Result<Vec<Puzzle>, AppError> {
    let dir = config.workspace.puzzles_dir();
    let puzzles = build_corpus(&dir)?;
    let out = config.workspace.puzzles_file(PUZZLES_FILE);
    store::save_json(&out, &puzzles)?;
    info!(count = puzzles.len(), path = %out.display(), "corpus written");
    println!("已处理{}个谜题，保存到{}", puzzles.len(), out.display());
    Ok(puzzles)
}

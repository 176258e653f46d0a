//! Section extraction for markdown puzzle files.
//!
//! A puzzle file looks like:
//!
//! ```text
//! # 标题
//!
//! ### 汤面
//! 一个男人走进餐厅……
//!
//! ### 汤底
//! 他曾在海难中……
//!
//! ### 附加说明
//! 来源：……
//! ```

use std::sync::OnceLock;

use regex::Regex;

pub const SURFACE_HEADER: &str = "### 汤面";
pub const BASE_HEADER: &str = "### 汤底";
pub const NOTE_HEADER: &str = "### 附加说明";

/// Stored in place of a missing question or answer.
pub const MISSING_CONTENT: &str = "内容缺失";
/// Stored in place of a missing note.
pub const NO_NOTE: &str = "无附加说明";

/// The three sections of a puzzle file, trimmed, with sentinels for
/// anything missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleSections {
    pub question: String,
    pub answer: String,
    pub note: String,
}

impl PuzzleSections {
    /// `false` when the question or the answer could not be found.
    pub fn is_complete(&self) -> bool {
        self.question != MISSING_CONTENT && self.answer != MISSING_CONTENT
    }

    pub fn has_note(&self) -> bool {
        self.note != NO_NOTE
    }
}

fn question_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"### 汤面\s*\n([\s\S]+?)\s*(?:\n### 汤底|\z)").expect("static regex")
    })
}

fn answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"### 汤底\s*\n([\s\S]+?)\s*(?:\n### 附加说明|\z)").expect("static regex")
    })
}

fn note_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"### 附加说明\s*\n([\s\S]+)").expect("static regex"))
}

fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pull question / answer / note out of a puzzle file.
///
/// Each section runs from its header (plus the line break after it) to the
/// next expected header or the end of the file.
pub fn extract_sections(content: &str) -> PuzzleSections {
    PuzzleSections {
        question: capture(question_re(), content).unwrap_or_else(|| MISSING_CONTENT.to_string()),
        answer: capture(answer_re(), content).unwrap_or_else(|| MISSING_CONTENT.to_string()),
        note: capture(note_re(), content).unwrap_or_else(|| NO_NOTE.to_string()),
    }
}

/// Plain substring split used when scoring: the question is everything
/// between `### 汤面` and `### 汤底` (or the end), the answer everything after
/// `### 汤底` up to `### 附加说明` (or the end). A missing header gives an
/// empty part.
pub fn split_surface_and_base(content: &str) -> (String, String) {
    let question = match content.find(SURFACE_HEADER) {
        Some(pos) => {
            let body = &content[pos + SURFACE_HEADER.len()..];
            let end = body.find(BASE_HEADER).unwrap_or(body.len());
            body[..end].trim().to_string()
        }
        None => String::new(),
    };

    let answer = match content.find(BASE_HEADER) {
        Some(pos) => {
            let body = &content[pos + BASE_HEADER.len()..];
            let end = body.find(NOTE_HEADER).unwrap_or(body.len());
            body[..end].trim().to_string()
        }
        None => String::new(),
    };

    (question, answer)
}

/// The answer as shown to a player: text after `### 汤底` up to the next
/// `###` header or the end.
pub fn reveal_answer(content: &str) -> Option<String> {
    let pos = content.find(BASE_HEADER)?;
    let body = &content[pos + BASE_HEADER.len()..];
    let end = body.find("###").unwrap_or(body.len());
    Some(body[..end].trim().to_string())
}

/// The question alone, for display. `None` when either header is missing.
pub fn surface_for_display(content: &str) -> Option<String> {
    let pos = content.find(SURFACE_HEADER)?;
    let body = &content[pos + SURFACE_HEADER.len()..];
    let end = body.find(BASE_HEADER)?;
    Some(body[..end].trim().to_string())
}

//! Prompt templates for every LLM call.
//!
//! Templates are plain-text files under `config/prompts/` using `{{key}}`
//! placeholders. Each one is also compiled into the binary, so a missing
//! override directory only means the built-in wording is used. Dropping an
//! edited copy of a file into the configured prompts directory replaces the
//! built-in text for that template.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

/// Every prompt the jobs send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    FollowupsSystem,
    Followups,
    HostAnswer,
    GameAnswer,
    GameCheck,
    GameHint,
    Endings,
    Explanations,
    EndingProbs,
    EndingProbsBackground,
    ExplanationProbs,
}

impl Template {
    pub const ALL: [Template; 11] = [
        Template::FollowupsSystem,
        Template::Followups,
        Template::HostAnswer,
        Template::GameAnswer,
        Template::GameCheck,
        Template::GameHint,
        Template::Endings,
        Template::Explanations,
        Template::EndingProbs,
        Template::EndingProbsBackground,
        Template::ExplanationProbs,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Template::FollowupsSystem => "followups_system.txt",
            Template::Followups => "followups.txt",
            Template::HostAnswer => "host_answer.txt",
            Template::GameAnswer => "game_answer.txt",
            Template::GameCheck => "game_check.txt",
            Template::GameHint => "game_hint.txt",
            Template::Endings => "endings.txt",
            Template::Explanations => "explanations.txt",
            Template::EndingProbs => "ending_probs.txt",
            Template::EndingProbsBackground => "ending_probs_background.txt",
            Template::ExplanationProbs => "explanation_probs.txt",
        }
    }

    /// Placeholders the template is expected to contain.
    pub fn vars(self) -> &'static [&'static str] {
        match self {
            Template::FollowupsSystem => &[],
            Template::Followups => &["n", "question"],
            Template::HostAnswer => &["title", "question", "answer", "followup"],
            Template::GameAnswer | Template::GameCheck | Template::GameHint => &["puzzle"],
            Template::Endings => &["n", "begin"],
            Template::Explanations => &["n", "begin", "end"],
            Template::EndingProbs => &["begin", "options"],
            Template::EndingProbsBackground => &["begin", "background", "options"],
            Template::ExplanationProbs => &["begin", "end", "options"],
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            Template::FollowupsSystem => include_str!("../config/prompts/followups_system.txt"),
            Template::Followups => include_str!("../config/prompts/followups.txt"),
            Template::HostAnswer => include_str!("../config/prompts/host_answer.txt"),
            Template::GameAnswer => include_str!("../config/prompts/game_answer.txt"),
            Template::GameCheck => include_str!("../config/prompts/game_check.txt"),
            Template::GameHint => include_str!("../config/prompts/game_hint.txt"),
            Template::Endings => include_str!("../config/prompts/endings.txt"),
            Template::Explanations => include_str!("../config/prompts/explanations.txt"),
            Template::EndingProbs => include_str!("../config/prompts/ending_probs.txt"),
            Template::EndingProbsBackground => {
                include_str!("../config/prompts/ending_probs_background.txt")
            }
            Template::ExplanationProbs => include_str!("../config/prompts/explanation_probs.txt"),
        }
    }
}

/// Template store rooted at an override directory.
#[derive(Debug, Clone)]
pub struct Prompts {
    dir: PathBuf,
}

impl Prompts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Raw template text: the override file when present, else the built-in.
    pub fn text(&self, template: Template) -> String {
        let path = self.dir.join(template.file_name());
        match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => {
                debug!("prompt: '{}' not overridden, using built-in", path.display());
                template.builtin().trim().to_string()
            }
        }
    }

    /// Load `template` and substitute its placeholders.
    pub fn render<'a, I>(&self, template: Template, vars: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        render(&self.text(template), vars)
    }
}

/// Substitute `{{key}}` placeholders in one left-to-right pass.
///
/// Values are inserted verbatim and never re-scanned, so puzzle text that
/// happens to contain `{{…}}` is left alone. Unknown placeholders are kept.
pub fn render<'a, I>(text: &str, vars: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let vars: HashMap<&str, &str> = vars.into_iter().collect();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Number `items` from `start` as `"{i}. {item}"` lines.
pub fn numbered(items: &[String], start: usize) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + start, item))
        .collect::<Vec<_>>()
        .join("\n")
}

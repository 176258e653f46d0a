//! `play`: an interactive game with the LLM as host.
//!
//! The host sees the whole markdown puzzle (question and answer) as its
//! system prompt. The player types yes/no questions, asks for hints, or
//! submits a solution prefixed with `汤底`.

use std::fs;
use std::path::{Path, PathBuf};

use rand_core::{OsRng, RngCore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::answers::braced;
use crate::config::Config;
use crate::error::AppError;
use crate::llm::{self, ChatRequest, LlmProvider, ProviderError};
use crate::prompt::{Prompts, Template};
use crate::puzzle::corpus::list_markdown_files;
use crate::puzzle::markdown::{reveal_answer, surface_for_display};
use crate::puzzle::title_from_filename;

const TEMPERATURE: f32 = 0.7;
const SOLUTION_PREFIX: &str = "汤底";
const HINT_REQUEST: &str = "请给我一个提示";

pub const RULES: &str = "你可以通过提问来获取线索，问题请用\"是/不是\"能回答的形式。\n\
当你想猜测汤底时，请以\"汤底\"开头描述你的推理。\n\
输入\"提示\"获取提示，\"答案\"查看汤底，\"quit\"退出。";

/// One line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Solution(String),
    Hint,
    Reveal,
    Quit,
    Question(String),
}

pub fn classify_input(line: &str) -> Command {
    let input = line.trim();
    if input.is_empty() {
        return Command::Empty;
    }
    if let Some(rest) = input.strip_prefix(SOLUTION_PREFIX) {
        let rest = rest.trim_start_matches([':', '：']).trim();
        return Command::Solution(rest.to_string());
    }
    match input {
        "提示" | "hint" => Command::Hint,
        "答案" | "solve" => Command::Reveal,
        "quit" | "exit" => Command::Quit,
        _ => Command::Question(input.to_string()),
    }
}

/// The host's judgement of a submitted solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckVerdict {
    Correct,
    Partial,
    Wrong,
    Other(String),
}

impl CheckVerdict {
    /// Classify by the first `{…}` group, or the whole reply without one.
    pub fn parse(reply: &str) -> Self {
        match host_text(reply) {
            "完全正确" => CheckVerdict::Correct,
            "部分正确" => CheckVerdict::Partial,
            "完全错误" => CheckVerdict::Wrong,
            other => CheckVerdict::Other(other.to_string()),
        }
    }
}

/// The first `{…}` group of a host reply, else the reply itself.
pub fn host_text(reply: &str) -> &str {
    braced(reply).unwrap_or_else(|| reply.trim())
}

/// A question the host has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clue {
    pub question: String,
    pub answer: String,
}

/// One loaded puzzle and the clues gathered so far.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub title: String,
    content: String,
    clues: Vec<Clue>,
}

impl GameSession {
    /// Build a session from raw markdown. Fails when the question or answer
    /// section is missing.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Result<Self, AppError> {
        let title = title.into();
        let content = content.into();
        if surface_for_display(&content).is_none() {
            return Err(AppError::Usage(format!("无效的谜题格式: '{title}' 缺少汤面或汤底部分")));
        }
        Ok(Self { title, content, clues: Vec::new() })
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(title_from_filename(&name), content)
    }

    pub fn question(&self) -> String {
        surface_for_display(&self.content).unwrap_or_default()
    }

    pub fn answer(&self) -> String {
        reveal_answer(&self.content).unwrap_or_default()
    }

    pub fn clues(&self) -> &[Clue] {
        &self.clues
    }

    fn host_request(&self, prompts: &Prompts, template: Template, user: String) -> ChatRequest {
        let system = prompts.render(template, [("puzzle", self.content.as_str())]);
        ChatRequest::user(user).with_system(system).with_temperature(TEMPERATURE)
    }

    pub fn question_request(&self, prompts: &Prompts, question: &str) -> ChatRequest {
        self.host_request(prompts, Template::GameAnswer, question.to_string())
    }

    pub fn check_request(&self, prompts: &Prompts, solution: &str) -> ChatRequest {
        self.host_request(prompts, Template::GameCheck, format!("{SOLUTION_PREFIX}: {solution}"))
    }

    pub fn hint_request(&self, prompts: &Prompts) -> ChatRequest {
        self.host_request(prompts, Template::GameHint, HINT_REQUEST.to_string())
    }

    /// Ask a yes/no question and record the clue.
    pub async fn ask(&mut self, llm: &LlmProvider, prompts: &Prompts, question: &str) -> Result<String, ProviderError> {
        let reply = llm.complete(&self.question_request(prompts, question)).await?;
        debug!(%reply, "host reply");
        let answer = host_text(&reply).to_string();
        self.clues.push(Clue { question: question.to_string(), answer: answer.clone() });
        Ok(answer)
    }

    pub async fn check(&self, llm: &LlmProvider, prompts: &Prompts, solution: &str) -> Result<CheckVerdict, ProviderError> {
        let reply = llm.complete(&self.check_request(prompts, solution)).await?;
        debug!(%reply, "host verdict");
        Ok(CheckVerdict::parse(&reply))
    }

    pub async fn hint(&self, llm: &LlmProvider, prompts: &Prompts) -> Result<String, ProviderError> {
        llm.complete(&self.hint_request(prompts)).await
    }
}

/// Pick one entry uniformly at random.
pub fn pick_random(files: &[PathBuf]) -> Option<&PathBuf> {
    if files.is_empty() {
        return None;
    }
    let idx = (OsRng.next_u64() % files.len() as u64) as usize;
    files.get(idx)
}

/// `name` as given when it exists, else inside the puzzle directory.
fn resolve_puzzle(config: &Config, name: &str) -> PathBuf {
    let given = PathBuf::from(name);
    if given.exists() || given.is_absolute() {
        given
    } else {
        config.workspace.puzzles_file(name)
    }
}

/// What the loop should do after one command.
enum Step {
    Continue,
    Stop,
}

async fn handle(
    session: &mut GameSession,
    llm: &LlmProvider,
    prompts: &Prompts,
    command: Command,
) -> Result<Step, ProviderError> {
    match command {
        Command::Empty => {}
        Command::Quit => return Ok(Step::Stop),
        Command::Reveal => println!("谜底：{}", session.answer()),
        Command::Hint => println!("提示：{}", session.hint(llm, prompts).await?),
        Command::Question(q) => println!("{}", session.ask(llm, prompts, &q).await?),
        Command::Solution(s) => match session.check(llm, prompts, &s).await? {
            CheckVerdict::Correct => {
                println!("完全正确！！！");
                println!("谜底：{}", session.answer());
                return Ok(Step::Stop);
            }
            CheckVerdict::Partial => println!("部分正确"),
            CheckVerdict::Wrong => println!("完全错误"),
            CheckVerdict::Other(text) => println!("{text}"),
        },
    }
    Ok(Step::Continue)
}

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Finished,
    Interrupted,
}

/// Feed `input` line by line into the session until the player quits, the
/// input ends, or `stop` resolves. `stop` is polled for the whole loop, so it
/// also cuts short a host call in flight.
async fn play_lines<R, S>(
    session: &mut GameSession,
    llm: &LlmProvider,
    prompts: &Prompts,
    input: R,
    stop: S,
) -> Exit
where
    R: AsyncBufRead + Unpin,
    S: Future,
{
    tokio::pin!(stop);
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = &mut stop => return Exit::Interrupted,
            line = lines.next_line() => line,
        };
        let input = match line {
            Ok(Some(l)) => l,
            Ok(None) => return Exit::Finished,
            Err(e) => {
                warn!("stdin read error: {e}");
                return Exit::Finished;
            }
        };
        let step = tokio::select! {
            biased;
            _ = &mut stop => return Exit::Interrupted,
            step = handle(session, llm, prompts, classify_input(&input)) => step,
        };
        match step {
            Ok(Step::Continue) => {}
            Ok(Step::Stop) => return Exit::Finished,
            Err(e) => eprintln!("处理失败: {e}"),
        }
    }
}

/// `play` job.
pub async fn run(config: &Config, puzzle: Option<&str>) -> Result<(), AppError> {
    let path = match puzzle {
        Some(name) => resolve_puzzle(config, name),
        None => {
            let files = list_markdown_files(&config.workspace.puzzles_dir())?;
            pick_random(&files)
                .cloned()
                .ok_or_else(|| AppError::Usage("没有找到任何谜题文件".into()))?
        }
    };
    let mut session = GameSession::load(&path)?;
    let llm = llm::build(config)?;
    let prompts = Prompts::new(config.workspace.prompts_dir());
    info!(puzzle = %path.display(), "game started");

    println!("【{}】", session.title);
    println!("{}\n", session.question());
    println!("{RULES}");

    let stdin = BufReader::new(tokio::io::stdin());
    if play_lines(&mut session, &llm, &prompts, stdin, tokio::signal::ctrl_c()).await == Exit::Interrupted {
        info!("interrupted");
    }

    info!(clues = session.clues().len(), "game over");
    Ok(())
}

//! Command-line parsing.
//!
//! ```text
//! haigui [-f <config.toml>] [-v...] <command> [args]
//! ```

use crate::error::AppError;
use crate::logprob::Source;

/// One subcommand with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Corpus,
    Followups,
    Answers,
    Scrape,
    Logprob(Source),
    Sort,
    Regress { plot: bool },
    Endings,
    EndingProbs { background: bool, title: Option<String> },
    Explanations,
    ExplanationProbs,
    Play { puzzle: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config: Option<String>,
    pub verbosity: u8,
    pub job: Job,
}

/// Either a job to run or a request for help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Help,
    Run(Args),
}

fn usage(msg: impl Into<String>) -> AppError {
    AppError::Usage(msg.into())
}

/// Parse everything after the program name.
pub fn parse<I>(args: I) -> Result<Parsed, AppError>
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut verbosity = 0u8;
    let mut command: Option<String> = None;
    let mut rest = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if command.is_some() {
            rest.push(arg);
            continue;
        }
        match arg.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help),
            "-f" | "--config" => {
                config = Some(iter.next().ok_or_else(|| usage("-f needs a path"))?);
            }
            flag if flag.starts_with("-v") && flag[1..].chars().all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((flag.len() - 1) as u8);
            }
            flag if flag.starts_with('-') => return Err(usage(format!("unknown flag: {flag}"))),
            _ => command = Some(arg),
        }
    }

    let Some(command) = command else {
        return Err(usage("missing command (try --help)"));
    };
    let job = parse_job(&command, rest)?;
    Ok(Parsed::Run(Args { config, verbosity, job }))
}

fn parse_job(command: &str, rest: Vec<String>) -> Result<Job, AppError> {
    let mut iter = rest.into_iter();
    let job = match command {
        "corpus" => Job::Corpus,
        "followups" => Job::Followups,
        "answers" => Job::Answers,
        "scrape" => Job::Scrape,
        "sort" => Job::Sort,
        "endings" => Job::Endings,
        "explanations" => Job::Explanations,
        "explanation-probs" => Job::ExplanationProbs,
        "logprob" => {
            let which = iter.next().ok_or_else(|| usage("usage: logprob <md|yesno>"))?;
            let source = Source::parse(&which)
                .ok_or_else(|| usage(format!("unknown logprob source '{which}' (expected md or yesno)")))?;
            Job::Logprob(source)
        }
        "regress" => {
            let mut plot = false;
            for arg in iter.by_ref() {
                match arg.as_str() {
                    "--plot" => plot = true,
                    other => return Err(usage(format!("regress: unexpected argument '{other}'"))),
                }
            }
            Job::Regress { plot }
        }
        "ending-probs" => {
            let mut background = false;
            let mut title = None;
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--with-background" => background = true,
                    "--title" => title = Some(iter.next().ok_or_else(|| usage("--title needs a value"))?),
                    other => return Err(usage(format!("ending-probs: unexpected argument '{other}'"))),
                }
            }
            Job::EndingProbs { background, title }
        }
        "play" => {
            let mut puzzle = None;
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--puzzle" | "-p" => {
                        puzzle = Some(iter.next().ok_or_else(|| usage("--puzzle needs a file"))?)
                    }
                    other => return Err(usage(format!("play: unexpected argument '{other}'"))),
                }
            }
            Job::Play { puzzle }
        }
        other => return Err(usage(format!("unknown command: {other}"))),
    };

    if let Some(extra) = iter.next() {
        return Err(usage(format!("{command}: unexpected argument '{extra}'")));
    }
    Ok(job)
}

pub const HELP: &str = "\
usage: haigui [-f <config.toml>] [-v...] <command> [args]

commands:
  corpus                  parse puzzles/*.md into puzzles/puzzles.json
  followups               generate follow-up questions per puzzle
  answers                 have the host answer every follow-up
  scrape                  scrape the yes/no puzzle site
  logprob <md|yesno>      score puzzles with the local model
  sort                    rank markdown puzzles by prompt effect
  regress [--plot]        length vs log-probability regressions
  endings                 generate alternative story endings
  ending-probs [--with-background] [--title <t>]
                          weigh generated endings against the true one
  explanations            generate explanations of each story
  explanation-probs       weigh explanations against the true answer
  play [--puzzle <file>]  play one puzzle interactively

flags:
  -f, --config <path>     config file (default: config/default.toml)
  -v, -vv, -vvv           log at info / debug / trace
  -h, --help              print this help

environment:
  OPENROUTER_API_KEY      API key for the openrouter provider
  HAIGUI_DATA_DIR         override workspace.data_dir
  HAIGUI_LOG_LEVEL        override workspace.log_level";

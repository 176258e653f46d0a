//! haigui: puzzle corpus jobs.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse arguments
//!   3. Load config
//!   4. Init logger (`-v` > `HAIGUI_LOG_LEVEL` > config)
//!   5. Run one job and exit

use haigui::cli::{self, Job, Parsed};
use haigui::endings::{self, ListKind};
use haigui::error::AppError;
use haigui::stats::{regress, sort};
use haigui::{answers, config, followups, game, logger, logprob, puzzle, scrape};
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = match cli::parse(std::env::args().skip(1))? {
        Parsed::Help => {
            println!("{}", cli::HELP);
            return Ok(());
        }
        Parsed::Run(args) => args,
    };

    let config = config::load(args.config.as_deref())?;

    let cli_level = logger::level_for_verbosity(args.verbosity);
    logger::init(cli_level.unwrap_or(&config.log_level), cli_level.is_some())?;

    info!(
        data_dir = %config.workspace.data_dir.display(),
        provider = %config.llm.provider,
        log_level = %config.log_level,
        "config loaded"
    );

    match args.job {
        Job::Corpus => puzzle::corpus::run(&config).map(|_| ()),
        Job::Followups => followups::run(&config).await,
        Job::Answers => answers::run(&config).await,
        Job::Scrape => scrape::run(&config).await,
        Job::Logprob(source) => logprob::run(&config, source),
        Job::Sort => sort::run(&config),
        Job::Regress { plot } => regress::run(&config, plot),
        Job::Endings => endings::run_lists(&config, ListKind::Endings).await,
        Job::EndingProbs { background, title } => {
            endings::run_ending_probs(&config, background, title.as_deref()).await
        }
        Job::Explanations => endings::run_lists(&config, ListKind::Explanations).await,
        Job::ExplanationProbs => endings::run_explanation_probs(&config).await,
        Job::Play { puzzle } => game::run(&config, puzzle.as_deref()).await,
    }
}

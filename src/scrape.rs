//! `scrape` job: collect English yes/no puzzles and their answers from the
//! puzzle catalogue site.
//!
//! Parsing is kept apart from fetching so both selectors can be tested
//! against fixed HTML.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Config, ScrapeConfig};
use crate::error::AppError;
use crate::store;

pub const YESNO_FILE: &str = "yesno_puzzles.json";

pub const ANSWER_NOT_FOUND: &str = "Answer not found";
pub const ANSWER_ERROR: &str = "Error getting answer";
pub const NO_PUZZLE_ID: &str = "Could not find puzzle ID";
pub const NOT_AVAILABLE: &str = "N/A";

/// One entry of `yesno_puzzles.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YesNoPuzzle {
    pub title: String,
    pub question: String,
    pub rating: String,
    pub answer: String,
    pub url: String,
}

/// A catalogue card before its story page has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub title: String,
    pub question: String,
    pub rating: String,
    pub story_id: Option<String>,
}

struct Selectors {
    item: Selector,
    title: Selector,
    question: Selector,
    rating: Selector,
    link: Selector,
    story_text: Selector,
}

fn selectors() -> &'static Selectors {
    static SEL: OnceLock<Selectors> = OnceLock::new();
    SEL.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("static selector");
        Selectors {
            item: parse(".catalog__item"),
            title: parse(".quest__title"),
            question: parse(".quest__story_question"),
            rating: parse(".quest__about .quest__about__value"),
            link: parse("a[href]"),
            story_text: parse(".quest__story__text"),
        }
    })
}

fn story_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/stories/(\d+)").expect("static regex"))
}

/// All text below `el`, concatenated and trimmed.
fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).next().map(text_of)
}

/// Numeric story id from a link such as `/en/stories/123`.
pub fn story_id(href: &str) -> Option<String> {
    story_id_re().captures(href).map(|c| c[1].to_string())
}

/// Catalogue cards on one listing page. Cards without a title or question
/// are skipped.
pub fn parse_listing(html: &str) -> Vec<ListingItem> {
    let sel = selectors();
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for card in document.select(&sel.item) {
        let (Some(title), Some(question)) =
            (first_text(card, &sel.title), first_text(card, &sel.question))
        else {
            warn!("catalogue card without title or question, skipping");
            continue;
        };
        let rating = first_text(card, &sel.rating).unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let story_id = card
            .select(&sel.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(story_id);

        items.push(ListingItem { title, question, rating, story_id });
    }
    items
}

/// The answer on a story page: the second `.quest__story__text` block.
pub fn parse_answer(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(&selectors().story_text).nth(1).map(text_of)
}

/// Listing page URL, `{base}?page={n}`.
pub fn page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("page", &page.to_string());
    url
}

pub struct Scraper {
    client: Client,
    base: Url,
    pages: u32,
    delay: Duration,
}

impl Scraper {
    pub fn new(cfg: &ScrapeConfig) -> Result<Self, AppError> {
        let base = Url::parse(&cfg.base_url)
            .map_err(|e| AppError::Config(format!("invalid scrape.base_url '{}': {e}", cfg.base_url)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| AppError::Scrape(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base, pages: cfg.pages, delay: Duration::from_millis(cfg.delay_ms) })
    }

    pub fn story_url(&self, id: &str) -> String {
        format!("{}/stories/{id}", self.base.as_str().trim_end_matches('/'))
    }

    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Scrape(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Scrape(format!("GET {url}: HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| AppError::Scrape(format!("GET {url}: failed to read body: {e}")))
    }

    /// Answer text for one story, or the matching placeholder.
    pub async fn answer(&self, url: &str) -> String {
        match self.fetch(url).await {
            Ok(html) => parse_answer(&html).unwrap_or_else(|| ANSWER_NOT_FOUND.to_string()),
            Err(e) => {
                warn!(%url, error = %e, "failed to scrape answer");
                ANSWER_ERROR.to_string()
            }
        }
    }

    pub async fn scrape_page(&self, page: u32) -> Result<Vec<YesNoPuzzle>, AppError> {
        let html = self.fetch(page_url(&self.base, page).as_str()).await?;
        let items = parse_listing(&html);
        debug!(page, cards = items.len(), "listing parsed");

        let mut puzzles = Vec::with_capacity(items.len());
        for item in items {
            let (answer, url) = match &item.story_id {
                Some(id) => {
                    let url = self.story_url(id);
                    (self.answer(&url).await, url)
                }
                None => (NO_PUZZLE_ID.to_string(), NOT_AVAILABLE.to_string()),
            };
            puzzles.push(YesNoPuzzle {
                title: item.title,
                question: item.question,
                rating: item.rating,
                answer,
                url,
            });
            tokio::time::sleep(self.delay).await;
        }
        Ok(puzzles)
    }

    /// Walk pages `1..=pages`. A failing page is logged and skipped.
    pub async fn scrape_all(&self) -> Vec<YesNoPuzzle> {
        let mut all = Vec::new();
        for page in 1..=self.pages {
            info!(page, "scraping page");
            match self.scrape_page(page).await {
                Ok(mut puzzles) => all.append(&mut puzzles),
                Err(e) => warn!(page, error = %e, "page failed, skipping"),
            }
        }
        all
    }
}

/// `scrape` job.
pub async fn run(config: &Config) -> Result<(), AppError> {
    let scraper = Scraper::new(&config.scrape)?;
    let puzzles = scraper.scrape_all().await;
    let out = config.workspace.data_file(YESNO_FILE);
    store::save_json(&out, &puzzles)?;
    println!(
        "Scraped {} puzzles with answers from {} pages",
        puzzles.len(),
        config.scrape.pages
    );
    Ok(())
}

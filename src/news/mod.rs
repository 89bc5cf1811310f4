mod model;
mod score;
mod wire;

pub use model::{FeedItem, ScoredArticle};
pub use score::{Coefficients, KeywordScorer};

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use url::Url;

use crate::core::PulseError;
use crate::core::client::constants::{DEFAULT_NEWS_FEED, USER_AGENT};

/// Fetches an RSS feed and scores its items.
#[derive(Debug, Clone)]
pub struct NewsScanner {
    http: reqwest::Client,
    feed_url: Url,
    scorer: KeywordScorer,
}

impl NewsScanner {
    /// A scanner for `feed_url` with a 30 s request timeout.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be built.
    pub fn new(feed_url: Url, scorer: KeywordScorer) -> Result<Self, PulseError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            feed_url,
            scorer,
        })
    }

    /// The default front-page feed.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be built.
    pub fn default_feed(scorer: KeywordScorer) -> Result<Self, PulseError> {
        Self::new(Url::parse(DEFAULT_NEWS_FEED)?, scorer)
    }

    pub fn feed_url(&self) -> &Url {
        &self.feed_url
    }

    pub fn scorer(&self) -> &KeywordScorer {
        &self.scorer
    }

    /// Downloads the feed and scores every item on `title + " " + description`.
    ///
    /// # Errors
    ///
    /// Transport errors, non-success statuses and unparseable feeds.
    #[tracing::instrument(skip(self), fields(feed = %self.feed_url), err)]
    pub async fn scan(&self) -> Result<Vec<ScoredArticle>, PulseError> {
        let resp = self.http.get(self.feed_url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PulseError::Status {
                status: status.as_u16(),
                url: self.feed_url.to_string(),
            });
        }
        let body = resp.text().await?;
        let items = wire::parse_feed(&body)?;

        let articles = items
            .into_iter()
            .map(|item| {
                let text = match &item.description {
                    Some(d) => format!("{} {}", item.title, d),
                    None => item.title.clone(),
                };
                ScoredArticle {
                    score: self.scorer.score(&text),
                    title: item.title,
                    description: item.description,
                    url: item.link,
                }
            })
            .collect();
        Ok(articles)
    }
}

/// The current scored-article collection.
///
/// Replaced wholesale by [`NewsBoard::replace`]; readers always see either the
/// previous or the new collection, never a mix.
#[derive(Debug, Clone, Default)]
pub struct NewsBoard {
    articles: Arc<RwLock<Vec<ScoredArticle>>>,
}

impl NewsBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, articles: Vec<ScoredArticle>) {
        *self.articles.write().await = articles;
    }

    pub async fn all(&self) -> Vec<ScoredArticle> {
        self.articles.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.articles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.articles.read().await.is_empty()
    }

    /// The `n` highest-scoring articles, best first. Ties keep feed order.
    pub async fn top(&self, n: usize) -> Vec<ScoredArticle> {
        let mut articles = self.all().await;
        articles.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        articles.truncate(n);
        articles
    }

    /// Mean score over the collection, `0` when it is empty.
    pub async fn average_score(&self) -> f64 {
        let guard = self.articles.read().await;
        if guard.is_empty() {
            return 0.0;
        }
        guard.iter().map(|a| a.score).sum::<f64>() / guard.len() as f64
    }
}

/// Rescans the feed and swaps the board's contents.
///
/// On failure the board keeps its previous collection. Returns the number of
/// articles now on the board.
///
/// # Errors
///
/// Whatever [`NewsScanner::scan`] reports.
pub async fn refresh_board(scanner: &NewsScanner, board: &NewsBoard) -> Result<usize, PulseError> {
    let articles = scanner.scan().await?;
    let n = articles.len();
    board.replace(articles).await;
    tracing::info!(articles = n, "news board refreshed");
    Ok(n)
}

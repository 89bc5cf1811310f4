use serde::{Deserialize, Serialize};

/// A feed item before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub description: Option<String>,
    pub link: String,
}

/// A feed item together with its keyword sentiment score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    /// The headline of the article.
    pub title: String,
    /// The feed's summary, when it carries one.
    pub description: Option<String>,
    /// A direct link to the article.
    pub url: String,
    /// Positive for good news, negative for bad news.
    pub score: f64,
}

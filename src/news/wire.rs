//! Minimal RSS 2.0 item extraction.
//!
//! Only `<item>` elements and their `title`, `description` and `link` children
//! are read. CDATA sections are unwrapped and the five XML entities plus
//! numeric character references are decoded.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::PulseError;
use crate::news::model::FeedItem;

static ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").expect("item pattern"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").expect("title pattern"));
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<description\b[^>]*>(.*?)</description>").expect("description pattern")
});
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link\b[^>]*>(.*?)</link>").expect("link pattern"));
static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<!\[CDATA\[(.*?)\]\]>\s*$").expect("cdata pattern"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#(x[0-9a-fA-F]+|[0-9]+)|(lt|gt|quot|apos|amp));").expect("entity pattern")
});

/// Extracts the items of an RSS document.
///
/// Items without a title or a link are skipped.
///
/// # Errors
///
/// [`PulseError::Data`] if the document has no `<rss>` or `<channel>` root.
pub(crate) fn parse_feed(body: &str) -> Result<Vec<FeedItem>, PulseError> {
    if !body.contains("<rss") && !body.contains("<channel") {
        return Err(PulseError::Data("not an RSS document".into()));
    }

    let items = ITEM
        .captures_iter(body)
        .filter_map(|cap| {
            let inner = cap.get(1)?.as_str();
            let title = child_text(&TITLE, inner)?;
            let link = child_text(&LINK, inner)?;
            let description = child_text(&DESCRIPTION, inner);
            Some(FeedItem {
                title,
                description,
                link,
            })
        })
        .collect();
    Ok(items)
}

fn child_text(pattern: &Regex, item: &str) -> Option<String> {
    let raw = pattern.captures(item)?.get(1)?.as_str();
    let text = match CDATA.captures(raw) {
        Some(c) => c.get(1).map_or("", |m| m.as_str()).to_string(),
        None => decode_entities(raw),
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Decodes entity and character references in a single pass.
fn decode_entities(raw: &str) -> String {
    ENTITY
        .replace_all(raw, |c: &regex::Captures<'_>| {
            if let Some(named) = c.get(2) {
                return match named.as_str() {
                    "lt" => "<",
                    "gt" => ">",
                    "quot" => "\"",
                    "apos" => "'",
                    _ => "&",
                }
                .to_string();
            }
            let digits = &c[1];
            let code = match digits.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .into_owned()
}

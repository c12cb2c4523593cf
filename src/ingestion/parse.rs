use chrono::{DateTime, Utc};
use rss::{Channel, Item};

use super::types::{ParsedFeed, RawFeedItem};

/// Parse an RSS 2.0 document, falling back to feed-rs for Atom, RSS 1.0 and JSON Feed.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, String> {
    match Channel::read_from(bytes) {
        Ok(ch) => Ok(from_channel(&ch)),
        Err(rss_err) => match feed_rs::parser::parse(bytes) {
            Ok(feed) => Ok(from_feed_rs(feed)),
            Err(e) => Err(format!("not a valid feed (rss: {}; fallback: {})", rss_err, e)),
        },
    }
}

fn from_channel(ch: &Channel) -> ParsedFeed {
    let title = Some(ch.title().to_string()).filter(|t| !t.trim().is_empty());
    let items = ch.items().iter().map(from_item).collect();
    ParsedFeed { title, items }
}

fn from_item(item: &Item) -> RawFeedItem {
    RawFeedItem {
        title: item.title().unwrap_or_default().to_string(),
        link: item.link().unwrap_or_default().to_string(),
        description: item.description().map(str::to_string),
        content_encoded: item.content().map(str::to_string),
        content: None,
        summary: None,
        published_at: extract_published_at(item),
        categories: item.categories().iter().map(|c| c.name().to_string()).collect(),
    }
}

pub fn extract_published_at(item: &Item) -> Option<DateTime<Utc>> {
    if let Some(pub_date) = item.pub_date() {
        if let Ok(dt) = DateTime::parse_from_rfc2822(pub_date) { return Some(dt.with_timezone(&Utc)); }
    }
    // Attempt Dublin Core date if available (RFC3339)
    if let Some(dc) = item.dublin_core_ext() {
        if let Some(first) = dc.dates().first() {
            if let Ok(dt) = DateTime::parse_from_rfc3339(first) { return Some(dt.with_timezone(&Utc)); }
        }
    }
    None
}

fn from_feed_rs(feed: feed_rs::model::Feed) -> ParsedFeed {
    let title = feed.title.map(|t| t.content).filter(|t| !t.trim().is_empty());
    let items = feed
        .entries
        .into_iter()
        .map(|e| {
            let link = e.links.first().map(|l| l.href.clone()).unwrap_or_default();
            RawFeedItem {
                title: e.title.map(|t| t.content).unwrap_or_default(),
                link,
                description: None,
                content_encoded: None,
                content: e.content.and_then(|c| c.body),
                summary: e.summary.map(|s| s.content),
                published_at: e.published.or(e.updated),
                categories: e.categories.into_iter().map(|c| c.term).collect(),
            }
        })
        .collect();
    ParsedFeed { title, items }
}

use crate::feed::config::FeedConfig;

use super::extractor;
use super::types::RawFeedItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Priority(String),
    Excluded(String),
    Keyword(String),
    LocalMarker(String),
    NoKeywordMatch,
    Unfiltered,
}

impl FilterDecision {
    pub fn accepted(&self) -> bool {
        !matches!(self, FilterDecision::Excluded(_) | FilterDecision::NoKeywordMatch)
    }
}

pub fn is_valid(item: &RawFeedItem) -> bool {
    !item.title.trim().is_empty() && !item.link.trim().is_empty()
}

pub fn passes_filter(item: &RawFeedItem, cfg: &FeedConfig) -> bool {
    let decision = evaluate(item, cfg);
    match &decision {
        FilterDecision::Priority(k) => tracing::debug!(keyword = %k, title = %item.title, "priority keyword"),
        FilterDecision::Unfiltered | FilterDecision::Keyword(_) | FilterDecision::LocalMarker(_) => {}
        rejected => tracing::debug!(decision = ?rejected, title = %item.title, "filtered out"),
    }
    decision.accepted()
}

/// Apply priority, exclude and keyword rules in that order; the first rule that fires decides.
pub fn evaluate(item: &RawFeedItem, cfg: &FeedConfig) -> FilterDecision {
    let text = combined_text(item);

    if let Some(k) = first_term(&cfg.priority_keywords, |k| text.contains(k)) {
        return FilterDecision::Priority(k);
    }
    if let Some(k) = first_term(&cfg.exclude_keywords, |k| contains_bounded(&text, k)) {
        return FilterDecision::Excluded(k);
    }
    if cfg.keywords.is_empty() {
        return FilterDecision::Unfiltered;
    }

    let link = item.link.to_lowercase();
    let categories: Vec<String> = item.categories.iter().map(|c| c.to_lowercase()).collect();
    let hit = first_term(&cfg.keywords, |k| {
        text.contains(k) || link.contains(k) || categories.iter().any(|c| c.contains(k))
    });
    if let Some(k) = hit {
        return FilterDecision::Keyword(k);
    }
    match first_term(&cfg.local_markers, |m| text.contains(m)) {
        Some(m) => FilterDecision::LocalMarker(m),
        None => FilterDecision::NoKeywordMatch,
    }
}

fn combined_text(item: &RawFeedItem) -> String {
    let body = extractor::richest_raw(item).unwrap_or_default();
    format!("{} {} {}", item.title, item.description.as_deref().unwrap_or_default(), body).to_lowercase()
}

fn first_term<F>(terms: &[String], mut matches: F) -> Option<String>
where
    F: FnMut(&str) -> bool,
{
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .find(|t| matches(t))
}

/// `term` occurs preceded by start/whitespace and followed by end, whitespace, `:` or `.`.
fn contains_bounded(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(i, m)| {
        let before_ok = text[..i].chars().next_back().is_none_or(char::is_whitespace);
        let after_ok = text[i + m.len()..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace() || c == ':' || c == '.');
        before_ok && after_ok
    })
}

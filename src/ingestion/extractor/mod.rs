mod clean;
mod generic;

pub use clean::clean_html;
pub use generic::{html_to_text, paragraphs_to_html};

use super::types::RawFeedItem;

/// Where a feed item's body came from, richest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentField {
    ContentEncoded,
    Content,
    Summary,
    Description,
}

type FieldFn = fn(&RawFeedItem) -> Option<&str>;

// Tried in order; the first field with non-blank text wins.
const CONTENT_FIELDS: [(ContentField, FieldFn); 4] = [
    (ContentField::ContentEncoded, content_encoded),
    (ContentField::Content, content),
    (ContentField::Summary, summary),
    (ContentField::Description, description),
];

fn content_encoded(i: &RawFeedItem) -> Option<&str> { i.content_encoded.as_deref() }
fn content(i: &RawFeedItem) -> Option<&str> { i.content.as_deref() }
fn summary(i: &RawFeedItem) -> Option<&str> { i.summary.as_deref() }
fn description(i: &RawFeedItem) -> Option<&str> { i.description.as_deref() }

pub fn select_content(item: &RawFeedItem) -> Option<(ContentField, &str)> {
    CONTENT_FIELDS
        .iter()
        .find_map(|(field, get)| get(item).filter(|s| !s.trim().is_empty()).map(|s| (*field, s)))
}

pub fn richest_raw(item: &RawFeedItem) -> Option<&str> {
    select_content(item).map(|(_, s)| s)
}

/// Plain text of the item's short description, falling back to its summary.
pub fn description_text(item: &RawFeedItem) -> String {
    let raw = item
        .description
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(item.summary.as_deref())
        .unwrap_or_default();
    html_to_text(&clean_html(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_content_encoded_over_description() {
        let item = RawFeedItem {
            description: Some("short".into()),
            content_encoded: Some("<p>long</p>".into()),
            ..Default::default()
        };
        assert_eq!(select_content(&item), Some((ContentField::ContentEncoded, "<p>long</p>")));
    }

    #[test]
    fn blank_fields_are_skipped() {
        let item = RawFeedItem {
            content_encoded: Some("   ".into()),
            summary: Some("summary text".into()),
            description: Some("desc".into()),
            ..Default::default()
        };
        assert_eq!(select_content(&item), Some((ContentField::Summary, "summary text")));
    }

    #[test]
    fn nothing_selected_for_empty_item() {
        assert_eq!(select_content(&RawFeedItem::default()), None);
        assert_eq!(description_text(&RawFeedItem::default()), "");
    }
}

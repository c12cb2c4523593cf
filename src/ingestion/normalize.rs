use super::extractor::{self, clean_html, html_to_text, paragraphs_to_html};
use super::types::{NormalizedItem, RawFeedItem};

pub const TITLE_MAX_CHARS: usize = 200;
pub const SLUG_MAX_CHARS: usize = 50;
const MIN_CONTENT_CHARS: usize = 50;
const MIN_BODY_CHARS: usize = 20;
const EXCERPT_MIN_SENTENCE: usize = 20;
const EXCERPT_MAX_SENTENCE: usize = 200;
const EXCERPT_TRUNCATE_AT: usize = 150;
const GENERIC_EXCERPT: &str = "Imported article from an external news source.";
const SYNTHETIC_NOTE: &str = "This story was imported from an external feed. The full article is available from the original publisher.";

pub fn normalize(raw: &RawFeedItem) -> NormalizedItem {
    let title = clean_title(&raw.title);
    let description = extractor::description_text(raw);

    let mut body_text = extractor::richest_raw(raw)
        .map(|html| html_to_text(&clean_html(html)))
        .unwrap_or_default();
    if body_text.chars().count() < MIN_CONTENT_CHARS && description.chars().count() > body_text.chars().count() {
        body_text = description.clone();
    }

    let excerpt_source = if description.is_empty() { &body_text } else { &description };
    let excerpt = make_excerpt(excerpt_source, &title);

    let content = if body_text.chars().count() < MIN_BODY_CHARS {
        synthesize_content(&excerpt, &title, &raw.link)
    } else {
        paragraphs_to_html(&body_text)
    };

    NormalizedItem { slug: slugify(&title), title, content, excerpt }
}

pub fn clean_title(raw: &str) -> String {
    let text = html_to_text(raw);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, TITLE_MAX_CHARS).to_string()
}

/// First sentence when it is a reasonable length, else a word-boundary
/// truncation, else a generated line. Never empty.
pub fn make_excerpt(text: &str, title: &str) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(sentence) = first_sentence(&text) {
        let n = sentence.chars().count();
        if (EXCERPT_MIN_SENTENCE..=EXCERPT_MAX_SENTENCE).contains(&n) {
            return sentence.to_string();
        }
    }
    if text.chars().count() >= EXCERPT_MIN_SENTENCE {
        return truncate_words(&text, EXCERPT_TRUNCATE_AT);
    }
    if !title.trim().is_empty() {
        return format!("Article from RSS feed: {}", title.trim());
    }
    GENERIC_EXCERPT.to_string()
}

fn first_sentence(text: &str) -> Option<&str> {
    let end = text
        .char_indices()
        .find(|(i, c)| matches!(c, '.' | '!' | '?') && text[i + c.len_utf8()..].starts_with(' '))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(text.len());
    let s = text[..end].trim();
    if s.is_empty() { None } else { Some(s) }
}

fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max { return text.to_string(); }
    let cut = truncate_chars(text, max);
    let at_word = match cut.rfind(' ') {
        Some(i) if i > 0 => &cut[..i],
        _ => cut,
    };
    format!("{}...", at_word.trim_end_matches([',', ';', ':', ' ']))
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn synthesize_content(excerpt: &str, title: &str, link: &str) -> String {
    let lead = if excerpt.starts_with("Article from RSS feed:") || excerpt == GENERIC_EXCERPT { title } else { excerpt };
    let lead = if lead.trim().is_empty() { excerpt } else { lead };
    format!(
        "<p>{}</p>\n<p>{}</p>\n<p><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">Read the full story at the original source</a></p>",
        html_escape::encode_text(lead),
        SYNTHETIC_NOTE,
        html_escape::encode_double_quoted_attribute(link),
    )
}

pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ' || *c == '-')
        .collect();
    let hyphenated = kept.split_whitespace().collect::<Vec<_>>().join("-");
    let collapsed = hyphenated.split('-').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("-");
    let capped = truncate_chars(&collapsed, SLUG_MAX_CHARS).trim_matches('-');
    if capped.is_empty() { "article".to_string() } else { capped.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str) -> RawFeedItem {
        RawFeedItem { title: title.into(), link: "https://news.example/a?x=1&y=2".into(), ..Default::default() }
    }

    #[test]
    fn title_only_item_gets_synthetic_body_with_link() {
        let n = normalize(&raw("Water main break on Lomas"));
        assert!(!n.content.is_empty());
        assert!(n.content.contains("https://news.example/a?x=1&amp;y=2"));
        assert!(n.content.contains("Water main break on Lomas"));
        assert_eq!(n.excerpt, "Article from RSS feed: Water main break on Lomas");
    }

    #[test]
    fn rich_content_is_cleaned_into_paragraphs() {
        let mut r = raw("Budget passes");
        r.description = Some("The council passed the budget on Monday night. More follows.".into());
        r.content_encoded = Some(
            r#"<div class="elementor-widget"><p style="x">The city council approved a $1.2B budget after hours of debate.</p>
            <script>track()</script><p>Spending on parks rises by 4% next year.</p></div>"#
                .into(),
        );
        let n = normalize(&r);
        assert_eq!(
            n.content,
            "<p>The city council approved a $1.2B budget after hours of debate.</p>\n<p>Spending on parks rises by 4% next year.</p>"
        );
        assert_eq!(n.excerpt, "The council passed the budget on Monday night.");
        assert_eq!(n.slug, "budget-passes");
    }

    #[test]
    fn short_content_falls_back_to_longer_description() {
        let mut r = raw("Fire update");
        r.content_encoded = Some("<p>See link.</p>".into());
        r.description = Some("Crews contained the bosque fire late Tuesday after it burned forty acres near the river.".into());
        let n = normalize(&r);
        assert!(n.content.starts_with("<p>Crews contained the bosque fire"));
    }

    #[test]
    fn long_text_excerpt_truncates_at_word_boundary() {
        let text = "word ".repeat(60);
        let ex = make_excerpt(&text, "T");
        assert!(ex.ends_with("..."));
        assert!(ex.chars().count() <= EXCERPT_TRUNCATE_AT + 3);
        assert!(!ex.contains("wor..."));
    }

    #[test]
    fn excerpt_never_empty() {
        assert_eq!(make_excerpt("", ""), GENERIC_EXCERPT);
        assert_eq!(make_excerpt("Tiny.", "Title"), "Article from RSS feed: Title");
    }

    #[test]
    fn title_is_collapsed_and_capped() {
        assert_eq!(clean_title("  Council \n  meets  &amp; votes "), "Council meets & votes");
        assert_eq!(clean_title(&"x".repeat(500)).chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Hello, World! 2025 -- Edition"), "hello-world-2025-edition");
        assert_eq!(slugify("¡¿?!"), "article");
        let long = slugify(&"abcdefghij ".repeat(10));
        assert!(long.len() <= SLUG_MAX_CHARS);
        assert!(!long.ends_with('-'));
    }
}

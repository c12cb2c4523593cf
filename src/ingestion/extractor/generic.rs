use scraper::{ElementRef, Html, Node};

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "section", "article", "header", "footer", "figure", "figcaption", "pre", "table", "tr", "hr",
];

/// Plain text of an HTML fragment; block elements become blank-line paragraph breaks.
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() { return String::new(); }
    let doc = Html::parse_fragment(html);
    let mut buf = String::new();
    walk(doc.root_element(), &mut buf);
    normalize(&buf)
}

fn walk(el: ElementRef<'_>, buf: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => buf.push_str(t),
            Node::Element(e) => {
                let name = e.name();
                if matches!(name, "script" | "style" | "noscript") { continue; }
                if name == "br" { buf.push('\n'); continue; }
                let block = BLOCK_TAGS.contains(&name);
                if block { buf.push_str("\n\n"); }
                if let Some(child_el) = ElementRef::wrap(child) { walk(child_el, buf); }
                if block { buf.push_str("\n\n"); }
            }
            _ => {}
        }
    }
}

// Paragraphs separated by one blank line, whitespace collapsed inside each.
fn normalize(s: &str) -> String {
    let mut paras: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in s.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() { paras.push(collapse(&current.join(" "))); current.clear(); }
            continue;
        }
        current.push(trimmed);
    }
    if !current.is_empty() { paras.push(collapse(&current.join(" "))); }
    paras.retain(|p| !p.is_empty());
    paras.join("\n\n")
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Re-emit blank-line separated text as escaped `<p>` blocks.
pub fn paragraphs_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", html_escape::encode_text(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

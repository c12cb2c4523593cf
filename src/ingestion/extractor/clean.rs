use std::sync::OnceLock;

use regex::Regex;

fn re(slot: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    slot.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Strip scripts, page-builder markup, download links and presentational
/// attributes from feed HTML. The result is still HTML.
pub fn clean_html(html: &str) -> String {
    static BLOCKS: OnceLock<Regex> = OnceLock::new();
    static COMMENTS: OnceLock<Regex> = OnceLock::new();
    static SHORTCODES: OnceLock<Regex> = OnceLock::new();
    static WRAPPERS: OnceLock<Regex> = OnceLock::new();
    static FILE_LINKS: OnceLock<Regex> = OnceLock::new();
    static ATTRS: OnceLock<Regex> = OnceLock::new();
    static WS: OnceLock<Regex> = OnceLock::new();

    let out = re(&BLOCKS, r"(?is)<(script|style|noscript|iframe)\b[^>]*>.*?</(script|style|noscript|iframe)\s*>").replace_all(html, " ");
    let out = re(&COMMENTS, r"(?s)<!--.*?-->").replace_all(&out, " ");
    // WPBakery, Divi, Avada, Enfold, Cornerstone and core WordPress shortcodes
    let out = re(&SHORTCODES, r"(?i)\[/?(?:vc_|et_pb_|fusion_|av_|cs_|caption|gallery|embed)[^\]]*\]").replace_all(&out, " ");
    let out = re(&WRAPPERS, r"(?i)</?(?:div|span|section|figure|font|center)\b[^>]*>").replace_all(&out, " ");
    let out = re(
        &FILE_LINKS,
        r#"(?is)<a\b[^>]*href\s*=\s*["'][^"']*\.(?:pdf|docx?|xlsx?|pptx?|zip)(?:[?#][^"']*)?["'][^>]*>.*?</a\s*>"#,
    )
    .replace_all(&out, " ");
    let out = re(&ATTRS, r#"(?i)\s(?:class|style|id|data-[\w-]+)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).replace_all(&out, "");
    let out = re(&WS, r"\s+").replace_all(&out, " ");
    out.trim().to_string()
}

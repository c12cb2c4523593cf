use std::collections::HashSet;

/// The text of one story as seen by a similarity scorer.
#[derive(Debug, Clone, Copy)]
pub struct StoryText<'a> {
    pub title: &'a str,
    pub summary: &'a str,
}

/// Scores how likely two stories describe the same event, in `[0, 1]`.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, incoming: StoryText<'_>, stored: StoryText<'_>) -> f64;
}

/// Weighted word-set Jaccard over title and summary, floored when the titles
/// share a short phrase.
#[derive(Debug, Clone)]
pub struct JaccardPhraseScorer {
    pub title_weight: f64,
    pub summary_weight: f64,
    pub phrase_floor: f64,
}

impl Default for JaccardPhraseScorer {
    fn default() -> Self {
        Self { title_weight: 0.7, summary_weight: 0.3, phrase_floor: 0.8 }
    }
}

impl SimilarityScorer for JaccardPhraseScorer {
    fn score(&self, incoming: StoryText<'_>, stored: StoryText<'_>) -> f64 {
        let weighted = self.title_weight * jaccard(incoming.title, stored.title)
            + self.summary_weight * jaccard(incoming.summary, stored.summary);
        if shares_phrase(incoming.title, stored.title) { weighted.max(self.phrase_floor) } else { weighted }
    }
}

/// Lowercased alphanumeric tokens longer than three characters, in order.
pub fn significant_words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of the significant-word sets; 0 when both are empty.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<String> = significant_words(a).into_iter().collect();
    let b: HashSet<String> = significant_words(b).into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 { return 0.0; }
    a.intersection(&b).count() as f64 / union as f64
}

/// Two- and three-word windows over the significant words, plus the outer
/// pair of each three-word window so one inserted modifier still matches.
pub fn key_phrases(title: &str) -> HashSet<String> {
    let words = significant_words(title);
    let mut out = HashSet::new();
    for w in words.windows(2) { out.insert(w.join(" ")); }
    for w in words.windows(3) {
        out.insert(w.join(" "));
        out.insert(format!("{} {}", w[0], w[2]));
    }
    out
}

pub fn shares_phrase(a: &str, b: &str) -> bool {
    let pa = key_phrases(a);
    if pa.is_empty() { return false; }
    key_phrases(b).iter().any(|p| pa.contains(p))
}

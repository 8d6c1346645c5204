//! Lexical relevance scoring
//!
//! Keyword extraction by frequency, substring match scoring with a title
//! boost, and Jaccard word-set similarity. No index, no stemming — every
//! candidate is scored on demand, which is plenty at help-desk scale.

use rustc_hash::{FxHashMap, FxHashSet};

/// Tokens shorter than this are noise ("the", "for", "a"...).
pub const MIN_KEYWORD_LENGTH: usize = 5;

/// How many keywords a query boils down to.
pub const TOP_KEYWORDS: usize = 10;

/// Words this short don't count toward similarity.
const MIN_SIMILARITY_WORD_LENGTH: usize = 4;

/// Lowercase `text` and replace every non-alphanumeric char with a space.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

/// Extract the `top_n` most frequent tokens of at least `min_length`
/// characters. Ties rank in first-seen order, so the output is fully
/// deterministic for a given input.
pub fn extract_keywords(text: &str, min_length: usize, top_n: usize) -> Vec<String> {
    let normalized = normalize(text);

    // (count, first-seen position) per token
    let mut counts: FxHashMap<&str, (usize, usize)> = FxHashMap::default();
    let mut next_position = 0usize;

    for token in normalized.split_whitespace() {
        if token.chars().count() < min_length {
            continue;
        }
        let entry = counts.entry(token).or_insert_with(|| {
            let position = next_position;
            next_position += 1;
            (0, position)
        });
        entry.0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.truncate(top_n);

    ranked.into_iter().map(|(token, _)| token.to_string()).collect()
}

/// Score a candidate against a keyword list.
///
/// A keyword found in the candidate (case-insensitive substring) counts
/// 1.0; a keyword found in the title adds a further 0.5 boost. The sum is
/// normalized by the keyword count, landing in roughly [0, 1.5].
pub fn keyword_score(text: &str, title: &str, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let text_lc = text.to_lowercase();
    let title_lc = title.to_lowercase();

    let mut score = 0.0f32;
    for keyword in keywords {
        let in_text = text_lc.contains(keyword.as_str());
        let in_title = title_lc.contains(keyword.as_str());
        if in_text || in_title {
            score += 1.0;
        }
        if in_title {
            score += 0.5;
        }
    }

    score / keywords.len() as f32
}

/// Words long enough to be significant for similarity comparison.
fn significant_words(text: &str) -> FxHashSet<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_SIMILARITY_WORD_LENGTH)
        .map(|w| w.to_string())
        .collect()
}

/// Jaccard index over the significant-word sets of two texts.
///
/// Symmetric by construction; 0.0 when neither text has a significant
/// word, 1.0 when a non-empty text is compared with itself.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let words_a = significant_words(a);
    let words_b = significant_words(b);

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();

    intersection as f32 / union as f32
}

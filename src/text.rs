// Text helpers shared by query analysis, reranking, extractive answers and metrics

use std::collections::HashSet;

/// Words ignored by keyword extraction
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "being", "but", "by", "can", "could", "did", "do", "does", "doing", "for",
    "from", "had", "has", "have", "having", "he", "her", "here", "him", "his", "how", "i", "if",
    "in", "into", "is", "it", "its", "just", "me", "might", "more", "most", "must", "my", "no",
    "not", "of", "on", "only", "or", "our", "shall", "she", "should", "so", "some", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "to",
    "too", "us", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your",
];

#[inline]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Strip leading and trailing characters that are not letters or digits
#[inline]
pub fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Lowercase alphanumeric words in order of appearance
#[inline]
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Lowercase alphanumeric word set used for every overlap computation
#[inline]
pub fn word_set(text: &str) -> HashSet<String> {
    words(text).into_iter().collect()
}

/// Fraction of `keywords` present in `words`, or 0 when there are no keywords
#[inline]
pub fn overlap_ratio(keywords: &HashSet<String>, words: &HashSet<String>) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }
    let matched = keywords.iter().filter(|k| words.contains(*k)).count();
    matched as f32 / keywords.len() as f32
}

/// Truncate to at most `max_chars` characters, appending `...` when anything was cut
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str("...");
    truncated
}

/// Split text into sentence-like segments on terminal punctuation and line breaks
#[inline]
pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_segment(&mut segments, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|next| next.is_whitespace()) {
            push_segment(&mut segments, &mut current);
        }
    }
    push_segment(&mut segments, &mut current);

    segments
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

//! Text normalizer: deterministic `text -> tokens` transform shared by every
//! other stage (lexicon keys, context windows, scoring).
//!
//! Steps: lowercase, NFD decomposition with combining marks removed,
//! non-word characters replaced by spaces, whitespace collapsed, split,
//! tokens of one character dropped.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Lowercase and strip diacritics without splitting.
/// Used for lexicon keys and marker tables so they compare equal to tokens.
pub fn fold(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Full normalization into a token sequence (may be empty).
pub fn normalize(text: &str) -> Vec<String> {
    let folded = fold(text);
    let spaced: String = folded
        .chars()
        .map(|c| if is_word_char(c) || c.is_whitespace() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

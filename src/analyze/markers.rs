//! Closed token categories that shape a neighbour's polarity instead of
//! carrying their own. Every table is stored folded (lowercase, no
//! diacritics) so membership tests run directly against normalized tokens.
//!
//! Irony phrases are the exception: they are matched against the raw
//! lowercased text, accents included, and their order is significant
//! (first hit wins).

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Structural role of a token. `None` from [`category_of`] means "plain word".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Negation,
    Intensifier,
    Attenuator,
    Contrast,
}

const NEGATIONS: &[&str] = &[
    "pas", "non", "ne", "ni", "aucun", "rien", "jamais", "sans", "guere",
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("tres", 1.3),
    ("extremement", 1.5),
    ("vraiment", 1.2),
    ("particulierement", 1.3),
    ("fortement", 1.4),
    ("totalement", 1.4),
    ("completement", 1.4),
    ("absolument", 1.5),
    ("incroyablement", 1.6),
    ("exceptionnellement", 1.5),
    ("remarquablement", 1.4),
];

const ATTENUATORS: &[(&str, f64)] = &[
    ("peu", 0.4),
    ("legerement", 0.5),
    ("moderement", 0.6),
    ("relativement", 0.7),
    ("assez", 0.8),
    ("plutot", 0.7),
    ("quelque", 0.6),
    ("suffisamment", 0.8),
    ("modestement", 0.5),
    ("faiblement", 0.4),
];

/// Single-token contrast conjunctions.
const CONTRAST_WORDS: &[&str] = &[
    "mais", "cependant", "pourtant", "toutefois", "neanmoins", "or",
];

/// Two-token contrast locutions, matched as adjacent token pairs.
const CONTRAST_PAIRS: &[(&str, &str)] = &[
    ("par", "contre"),
    ("en", "revanche"),
    ("alors", "que"),
    ("tandis", "que"),
];

/// Ironic phrases with their base weight, in match priority order.
pub const IRONY_PHRASES: &[(&str, f64)] = &[
    ("bien sûr", -0.8),
    ("évidemment", -0.7),
    ("super", -0.6),
    ("génial", -0.6),
    ("formidable", -0.7),
    ("parfait", -0.6),
    ("excellent", -0.7),
    ("magnifique", -0.6),
    ("extraordinaire", -0.7),
    ("merveilleux", -0.6),
    ("quelle réussite", -0.8),
    ("bravo", -0.5),
    ("felicitations", -0.5),
    ("impeccable", -0.6),
];

/// Multiplier applied after a negation (magnitude; the sign flip is separate).
pub const NEGATION_SCALE: f64 = 1.2;

static INTENSIFIER_MAP: Lazy<HashMap<&'static str, f64>> =
    Lazy::new(|| INTENSIFIERS.iter().copied().collect());
static ATTENUATOR_MAP: Lazy<HashMap<&'static str, f64>> =
    Lazy::new(|| ATTENUATORS.iter().copied().collect());

#[inline]
pub fn is_negation(tok: &str) -> bool {
    NEGATIONS.contains(&tok)
}

#[inline]
pub fn intensifier(tok: &str) -> Option<f64> {
    INTENSIFIER_MAP.get(tok).copied()
}

#[inline]
pub fn attenuator(tok: &str) -> Option<f64> {
    ATTENUATOR_MAP.get(tok).copied()
}

#[inline]
pub fn is_contrast_word(tok: &str) -> bool {
    CONTRAST_WORDS.contains(&tok)
}

/// True if `window` holds a contrast marker, single token or adjacent pair.
pub fn window_has_contrast(window: &[String]) -> bool {
    if window.iter().any(|t| is_contrast_word(t)) {
        return true;
    }
    window.windows(2).any(|w| {
        CONTRAST_PAIRS
            .iter()
            .any(|(a, b)| w[0] == *a && w[1] == *b)
    })
}

pub fn category_of(tok: &str) -> Option<TokenCategory> {
    if is_negation(tok) {
        Some(TokenCategory::Negation)
    } else if intensifier(tok).is_some() {
        Some(TokenCategory::Intensifier)
    } else if attenuator(tok).is_some() {
        Some(TokenCategory::Attenuator)
    } else if is_contrast_word(tok) {
        Some(TokenCategory::Contrast)
    } else {
        None
    }
}

/// Structurally significant = belongs to any closed category.
#[inline]
pub fn is_structural(tok: &str) -> bool {
    category_of(tok).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_disjoint_for_known_markers() {
        assert_eq!(category_of("pas"), Some(TokenCategory::Negation));
        assert_eq!(category_of("tres"), Some(TokenCategory::Intensifier));
        assert_eq!(category_of("peu"), Some(TokenCategory::Attenuator));
        assert_eq!(category_of("mais"), Some(TokenCategory::Contrast));
        assert_eq!(category_of("croissance"), None);
    }

    #[test]
    fn contrast_pairs_match_adjacent_tokens_only() {
        let hit: Vec<String> = ["le", "par", "contre"].iter().map(|s| s.to_string()).collect();
        let miss: Vec<String> = ["par", "le", "contre"].iter().map(|s| s.to_string()).collect();
        assert!(window_has_contrast(&hit));
        assert!(!window_has_contrast(&miss));
    }
}

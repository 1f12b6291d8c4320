//! Context analyzer: per-token modifiers derived from neighbouring tokens.
//!
//! All functions are pure over `(tokens, index, lexicon)`. Windows are
//! clipped at the sequence edges.

use super::markers::{self, IRONY_PHRASES, NEGATION_SCALE};
use super::normalize::normalize;
use crate::lexicon::Lexicon;

/// Tokens scanned by the direct look-back checks.
pub const LOOKBACK: usize = 2;
/// Half-width of the local context window.
pub const LOCAL_WINDOW: usize = 3;
/// Chars taken on each side of an ironic phrase.
pub const IRONY_CONTEXT_CHARS: usize = 50;

const IRONY_PHRASE_CONFIDENCE: f64 = 0.8;
const IRONY_CONTRAST_CONFIDENCE: f64 = 0.7;
const IRONY_CONTRAST_SCALE: f64 = 0.8;
const CONTRAST_POLARITY_MIN: f64 = 0.3;

const EXAGGERATION_WEIGHT_MIN: f64 = 1.5;
const EXAGGERATION_NEIGHBOUR_MIN: f64 = 1.0;
const EXAGGERATION_HITS_MIN: usize = 3;
pub const EXAGGERATION_SCALE: f64 = 0.7;
pub const EXAGGERATION_CONFIDENCE: f64 = 0.8;

const INTENSIFIER_CONFIDENCE: f64 = 1.1;
const ATTENUATOR_CONFIDENCE: f64 = 0.9;

/// Multiplicative modifier with the sign tracked separately from the
/// magnitude: every negation hit scales by 1.2, but the sign flips once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modifier {
    pub magnitude: f64,
    pub negated: bool,
}

impl Default for Modifier {
    fn default() -> Self {
        Self::identity()
    }
}

impl Modifier {
    pub const fn identity() -> Self {
        Self {
            magnitude: 1.0,
            negated: false,
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.magnitude *= factor;
    }

    pub fn negate(&mut self) {
        self.negated = true;
        self.magnitude *= NEGATION_SCALE;
    }

    /// Signed multiplier.
    pub fn value(&self) -> f64 {
        if self.negated {
            -self.magnitude
        } else {
            self.magnitude
        }
    }
}

/// Outcome of the ±3 token window pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalContext {
    pub modifier: Modifier,
    /// Multiplier on the token confidence, capped at 1.0.
    pub confidence: f64,
}

/// Intensifier or attenuator found by the look-back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shift {
    Intensify(f64),
    Attenuate(f64),
}

impl Shift {
    pub fn factor(self) -> f64 {
        match self {
            Shift::Intensify(f) | Shift::Attenuate(f) => f,
        }
    }

    pub fn confidence(self) -> f64 {
        match self {
            Shift::Intensify(_) => INTENSIFIER_CONFIDENCE,
            Shift::Attenuate(_) => ATTENUATOR_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IronyTrigger {
    Phrase(&'static str),
    Contrast,
}

/// Irony override: replaces the token weight and confidence outright.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Irony {
    pub score: f64,
    pub confidence: f64,
    pub trigger: IronyTrigger,
}

/// Damping applied to runs of strong words.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exaggeration {
    pub modifier: f64,
    pub confidence: f64,
}

#[inline]
fn before(i: usize, n: usize) -> std::ops::Range<usize> {
    i.saturating_sub(n)..i
}

/// Any negation among the 2 tokens before `i`.
pub fn negation_lookback(tokens: &[String], i: usize) -> bool {
    tokens[before(i, LOOKBACK)]
        .iter()
        .any(|t| markers::is_negation(t))
}

/// First intensifier/attenuator among the 2 tokens before `i` (oldest first).
pub fn shift_lookback(tokens: &[String], i: usize) -> Option<Shift> {
    tokens[before(i, LOOKBACK)].iter().find_map(|t| {
        markers::intensifier(t)
            .map(Shift::Intensify)
            .or_else(|| markers::attenuator(t).map(Shift::Attenuate))
    })
}

/// ±3 window: preceding negations, and intensifiers/attenuators within ±2.
pub fn local_context(tokens: &[String], i: usize) -> LocalContext {
    let start = i.saturating_sub(LOCAL_WINDOW);
    let end = (i + LOCAL_WINDOW + 1).min(tokens.len());

    let mut modifier = Modifier::identity();
    let mut confidence = 1.0;

    for (j, tok) in tokens.iter().enumerate().take(end).skip(start) {
        if j == i {
            continue;
        }
        let preceding = j < i;
        let near = j.abs_diff(i) <= LOOKBACK;

        if markers::is_negation(tok) && preceding {
            modifier.negate();
        } else if let Some(f) = markers::intensifier(tok).filter(|_| near) {
            modifier.scale(f);
            confidence *= INTENSIFIER_CONFIDENCE;
        } else if let Some(f) = markers::attenuator(tok).filter(|_| near) {
            modifier.scale(f);
            confidence *= ATTENUATOR_CONFIDENCE;
        }
    }

    LocalContext {
        modifier,
        confidence: f64::min(1.0, confidence),
    }
}

/// Average of the nonzero lexicon weights among `tokens` (0 if none).
pub fn average_polarity(tokens: &[String], lexicon: &Lexicon) -> (f64, usize) {
    let (sum, n) = tokens
        .iter()
        .map(|t| lexicon.weight(t))
        .filter(|w| *w != 0.0)
        .fold((0.0, 0usize), |(s, n), w| (s + w, n + 1));
    if n == 0 {
        (0.0, 0)
    } else {
        (sum / n as f64, n)
    }
}

/// Context score of a free text: normalize, then [`average_polarity`].
pub fn text_polarity(text: &str, lexicon: &Lexicon) -> (f64, usize) {
    average_polarity(&normalize(text), lexicon)
}

/// Lexical irony trigger over the raw lowercased text.
/// Text-level: when it fires it applies to every scored token.
pub fn lexical_irony(text_lower: &str, lexicon: &Lexicon) -> Option<Irony> {
    IRONY_PHRASES.iter().find_map(|(phrase, base)| {
        let idx = text_lower.find(phrase)?;
        let head: Vec<char> = text_lower[..idx].chars().collect();
        let ctx_before: String = head[head.len().saturating_sub(IRONY_CONTEXT_CHARS)..]
            .iter()
            .collect();
        let ctx_after: String = text_lower[idx + phrase.len()..]
            .chars()
            .take(IRONY_CONTEXT_CHARS)
            .collect();

        let (surrounding, _) = text_polarity(&format!("{ctx_before} {ctx_after}"), lexicon);
        Some(Irony {
            score: base * (1.0 + surrounding.abs()),
            confidence: IRONY_PHRASE_CONFIDENCE,
            trigger: IronyTrigger::Phrase(phrase),
        })
    })
}

/// Contrastive irony: a contrast marker in the 3 preceding tokens whose
/// average polarity opposes the target's raw weight (both beyond ±0.3).
pub fn contrastive_irony(tokens: &[String], i: usize, lexicon: &Lexicon) -> Option<Irony> {
    if i < LOCAL_WINDOW {
        return None;
    }
    let window = &tokens[before(i, LOCAL_WINDOW)];
    if !markers::window_has_contrast(window) {
        return None;
    }

    let (prior, _) = average_polarity(window, lexicon);
    let current = lexicon.weight(&tokens[i]);
    let opposed = (prior > CONTRAST_POLARITY_MIN && current < -CONTRAST_POLARITY_MIN)
        || (prior < -CONTRAST_POLARITY_MIN && current > CONTRAST_POLARITY_MIN);

    opposed.then(|| Irony {
        score: -current * IRONY_CONTRAST_SCALE,
        confidence: IRONY_CONTRAST_CONFIDENCE,
        trigger: IronyTrigger::Contrast,
    })
}

/// Either trigger; the lexical one (precomputed per text) wins.
pub fn detect_irony(
    lexical: Option<Irony>,
    tokens: &[String],
    i: usize,
    lexicon: &Lexicon,
) -> Option<Irony> {
    lexical.or_else(|| contrastive_irony(tokens, i, lexicon))
}

/// Damp a strong word sitting in a run of strong words (±2, self included).
pub fn exaggeration(
    tokens: &[String],
    i: usize,
    weight: f64,
    lexicon: &Lexicon,
) -> Option<Exaggeration> {
    if weight.abs() <= EXAGGERATION_WEIGHT_MIN {
        return None;
    }
    let start = i.saturating_sub(LOOKBACK);
    let end = (i + LOOKBACK + 1).min(tokens.len());
    let strong = tokens[start..end]
        .iter()
        .filter(|t| lexicon.weight(t).abs() > EXAGGERATION_NEIGHBOUR_MIN)
        .count();

    (strong >= EXAGGERATION_HITS_MIN).then_some(Exaggeration {
        modifier: EXAGGERATION_SCALE,
        confidence: EXAGGERATION_CONFIDENCE,
    })
}

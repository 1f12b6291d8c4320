//! Scoring engine: one text in, one [`AnalysisResult`] out.
//!
//! Pure over a `&Lexicon`; the learning side effect lives in
//! [`super::learner`] and is driven by [`super::SentimentEngine`].
//!
//! Per scored token, in order:
//! 1) irony override (replaces weight and context confidence)
//! 2) local ±3 window modifier
//! 3) exaggeration damping
//! 4) direct 2-token look-back (negation, then intensifier/attenuator)
//! 5) global modifier `1 + contextScore×0.3`
//!
//! Steps 2 and 4 are cumulative on purpose: one negation in reach of both
//! passes scales the magnitude by 1.2 twice while flipping the sign once.

use serde::{Deserialize, Serialize};

use super::context::{self, IronyTrigger, Modifier};
use super::markers;
use super::normalize::normalize;
use crate::lexicon::{round2, Lexicon};

/// Texts shorter than this (in chars) short-circuit to a neutral result.
pub const MIN_TEXT_CHARS: usize = 5;
pub const SHORT_TEXT_CONFIDENCE: f64 = 0.05;

const SKIP_WEIGHT_BELOW: f64 = 0.1;
const RAW_SHARE: f64 = 0.7;
const CONTEXT_SHARE: f64 = 0.3;
const GLOBAL_CONTEXT_FACTOR: f64 = 0.3;

const CONFIDENCE_FLOOR: f64 = 0.1;
const CONFIDENCE_CEIL: f64 = 0.95;

const THRESHOLD_DEFAULT: f64 = 0.1;
const THRESHOLD_LOADED: f64 = 0.2;
const THRESHOLD_FLAT: f64 = 0.05;
const INTENSITY_LOADED: f64 = 0.7;
const INTENSITY_FLAT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breakdown entry for one token occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenScore {
    pub token: String,
    /// Lexicon weight before any override.
    pub base_weight: f64,
    /// Weight the modifier was applied to (differs from `base_weight` under irony).
    pub weight: f64,
    pub contribution: f64,
    pub modifier: f64,
    /// Usage-based confidence of the token.
    pub confidence: f64,
    /// Confidence multiplier accumulated from context cues.
    pub context_confidence: f64,
    pub irony: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irony_trigger: Option<String>,
    /// Structural marker kept for transparency; contributes 0.
    #[serde(default)]
    pub context_only: bool,
}

impl TokenScore {
    fn carrier(token: &str, lexicon: &Lexicon) -> Self {
        Self {
            token: token.to_string(),
            base_weight: lexicon.weight(token),
            weight: 0.0,
            contribution: 0.0,
            modifier: 1.0,
            confidence: lexicon.word_confidence(token),
            context_confidence: 1.0,
            irony: false,
            irony_trigger: None,
            context_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub score: f64,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub emotional_intensity: f64,
    pub irony_detected: bool,
    pub context_score: f64,
    /// Number of scored (non-carrier) tokens.
    pub word_count: usize,
    pub words: Vec<TokenScore>,
}

impl AnalysisResult {
    /// Fixed result for absent or too-short input.
    pub fn short_text() -> Self {
        Self {
            score: 0.0,
            sentiment: Sentiment::Neutral,
            confidence: SHORT_TEXT_CONFIDENCE,
            emotional_intensity: 0.0,
            irony_detected: false,
            context_score: 0.0,
            word_count: 0,
            words: Vec::new(),
        }
    }

    /// Scored entries only (carriers excluded).
    pub fn scored(&self) -> impl Iterator<Item = &TokenScore> {
        self.words.iter().filter(|w| !w.context_only)
    }
}

/// True when `analyze` would short-circuit without tokenizing.
pub fn too_short(text: Option<&str>) -> bool {
    text.map_or(true, |t| t.chars().count() < MIN_TEXT_CHARS)
}

/// Adaptive thresholds: ±0.2 above 0.7 intensity, ±0.05 below 0.3, else ±0.1.
pub fn classify(score: f64, emotional_intensity: f64) -> Sentiment {
    let threshold = if emotional_intensity > INTENSITY_LOADED {
        THRESHOLD_LOADED
    } else if emotional_intensity < INTENSITY_FLAT {
        THRESHOLD_FLAT
    } else {
        THRESHOLD_DEFAULT
    };

    if score > threshold {
        Sentiment::Positive
    } else if score < -threshold {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// `min(1, Σ|contribution| / n × 2)` over scored entries; 0 when none.
pub fn emotional_intensity<'a>(scored: impl IntoIterator<Item = &'a TokenScore>) -> f64 {
    let (sum, n) = scored
        .into_iter()
        .fold((0.0, 0usize), |(s, n), w| (s + w.contribution.abs(), n + 1));
    if n == 0 {
        0.0
    } else {
        f64::min(1.0, sum / n as f64 * 2.0)
    }
}

/// Score a text against a lexicon snapshot. No side effects.
pub fn analyze<'a>(lexicon: &Lexicon, text: impl Into<Option<&'a str>>) -> AnalysisResult {
    let text = text.into();
    let text = match text {
        Some(t) if !too_short(Some(t)) => t,
        _ => return AnalysisResult::short_text(),
    };

    let tokens = normalize(text);
    let (context_score, _) = context::average_polarity(&tokens, lexicon);
    let global = 1.0 + context_score * GLOBAL_CONTEXT_FACTOR;
    let lexical = context::lexical_irony(&text.to_lowercase(), lexicon);

    let mut words = Vec::with_capacity(tokens.len());
    for (i, tok) in tokens.iter().enumerate() {
        if markers::is_structural(tok) {
            words.push(TokenScore::carrier(tok, lexicon));
            continue;
        }
        let base = lexicon.weight(tok);
        if base.abs() < SKIP_WEIGHT_BELOW {
            continue;
        }
        words.push(score_token(&tokens, i, base, global, lexical, lexicon));
    }

    let scored: Vec<&TokenScore> = words.iter().filter(|w| !w.context_only).collect();
    let n = scored.len();

    let raw_average = if n == 0 {
        0.0
    } else {
        scored.iter().map(|w| w.contribution).sum::<f64>() / n as f64
    };
    let final_score = round2(raw_average * RAW_SHARE + context_score * CONTEXT_SHARE);

    let confidence = if n == 0 {
        CONFIDENCE_FLOOR
    } else {
        let avg = scored.iter().map(|w| w.confidence).sum::<f64>() / n as f64;
        round2(avg.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL))
    };

    let intensity = emotional_intensity(scored.iter().copied());
    let irony_detected = scored.iter().any(|w| w.irony);

    AnalysisResult {
        score: final_score,
        sentiment: classify(final_score, intensity),
        confidence,
        emotional_intensity: intensity,
        irony_detected,
        context_score: round2(context_score),
        word_count: n,
        words,
    }
}

fn score_token(
    tokens: &[String],
    i: usize,
    base: f64,
    global: f64,
    lexical: Option<context::Irony>,
    lexicon: &Lexicon,
) -> TokenScore {
    let mut weight = base;
    let mut ctx_conf = 1.0;
    let mut irony_trigger = None;

    if let Some(irony) = context::detect_irony(lexical, tokens, i, lexicon) {
        weight = irony.score;
        ctx_conf = irony.confidence;
        irony_trigger = Some(match irony.trigger {
            IronyTrigger::Phrase(p) => p.to_string(),
            IronyTrigger::Contrast => "contrast".to_string(),
        });
    }

    let local = context::local_context(tokens, i);
    let mut modifier: Modifier = local.modifier;
    ctx_conf *= local.confidence;

    if let Some(ex) = context::exaggeration(tokens, i, weight, lexicon) {
        modifier.scale(ex.modifier);
        ctx_conf *= ex.confidence;
    }

    if context::negation_lookback(tokens, i) {
        modifier.negate();
    }
    if let Some(shift) = context::shift_lookback(tokens, i) {
        modifier.scale(shift.factor());
        ctx_conf *= shift.confidence();
    }

    modifier.scale(global);
    let m = modifier.value();

    TokenScore {
        token: tokens[i].clone(),
        base_weight: base,
        weight,
        contribution: weight * m,
        modifier: m,
        confidence: lexicon.word_confidence(&tokens[i]),
        context_confidence: f64::min(1.0, ctx_conf),
        irony: irony_trigger.is_some(),
        irony_trigger,
        context_only: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::DEFAULT_LEARNING_RATE;

    fn seed() -> Lexicon {
        Lexicon::default_seed(DEFAULT_LEARNING_RATE)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn short_text_guard() {
        let lx = seed();
        for r in [analyze(&lx, ""), analyze(&lx, "ok"), analyze(&lx, None::<&str>)] {
            assert_eq!(r.score, 0.0);
            assert_eq!(r.sentiment, Sentiment::Neutral);
            assert_eq!(r.confidence, 0.05);
            assert!(r.words.is_empty());
        }
    }

    #[test]
    fn compounded_negation_modifier() {
        let lx = seed();
        let r = analyze(&lx, "Ce n'est pas bon");
        let bon = r.scored().find(|w| w.token == "bon").expect("bon scored");
        // local pass ×1.2, look-back ×1.2, single sign flip, global 1 + 1.0×0.3
        assert!(approx(bon.modifier, -1.44 * 1.3), "modifier {}", bon.modifier);
        assert!(approx(r.score, -1.01));
        assert_eq!(r.sentiment, Sentiment::Negative);
    }

    #[test]
    fn exaggeration_damping_reaches_token_contribution() {
        let lx = seed();
        let r = analyze(&lx, "horrible atroce catastrophe");
        // context score -2.0, global 1 - 2.0×0.3
        let global = 0.4;
        assert_eq!(r.word_count, 3);
        for w in r.scored() {
            assert!(approx(w.modifier, 0.7 * global), "{} modifier {}", w.token, w.modifier);
            assert!(approx(w.contribution, -2.0 * 0.7 * global));
            assert!(approx(w.context_confidence, 0.8));
        }

        // a lone strong word is not damped
        let single = analyze(&lx, "une catastrophe");
        let w = single.scored().next().expect("catastrophe scored");
        assert!(approx(w.modifier, global));
        assert!(approx(w.context_confidence, 1.0));
    }

    #[test]
    fn negation_carrier_is_context_only() {
        let lx = seed();
        let r = analyze(&lx, "Ce n'est pas bon");
        let pas = r.words.iter().find(|w| w.token == "pas").expect("carrier kept");
        assert!(pas.context_only);
        assert_eq!(pas.contribution, 0.0);
        assert_eq!(r.word_count, 1);
    }

    #[test]
    fn plain_positive_text() {
        let lx = seed();
        let r = analyze(&lx, "Ce n'est bon");
        // 1.0 × 1.3 × 0.7 + 1.0 × 0.3
        assert!(approx(r.score, 1.21));
        assert_eq!(r.sentiment, Sentiment::Positive);
        assert_eq!(r.confidence, 0.5);
    }

    #[test]
    fn no_scored_tokens_gives_floor_confidence() {
        let lx = seed();
        let r = analyze(&lx, "le chat dort sur le tapis");
        assert_eq!(r.score, 0.0);
        assert_eq!(r.confidence, 0.1);
        assert_eq!(r.word_count, 0);
        assert_eq!(r.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn thresholds_widen_with_intensity() {
        assert_eq!(classify(0.12, 0.5), Sentiment::Positive);
        assert_eq!(classify(0.12, 0.8), Sentiment::Neutral);
        assert_eq!(classify(0.07, 0.2), Sentiment::Positive);
        assert_eq!(classify(0.07, 0.5), Sentiment::Neutral);
        assert_eq!(classify(-0.25, 0.9), Sentiment::Negative);
    }

    #[test]
    fn lexical_irony_turns_praise_negative() {
        let lx = seed();
        let r = analyze(&lx, "Bravo, quelle réussite, c'est une catastrophe totale");
        assert!(r.irony_detected);
        let bravo = r.scored().find(|w| w.token == "bravo").expect("bravo scored");
        assert!(bravo.base_weight > 0.0);
        assert!(bravo.contribution < 0.0);
        assert!(r.score < 0.0);
        assert_eq!(r.sentiment, Sentiment::Negative);
    }

    #[test]
    fn contrast_flips_opposed_clause() {
        let lx = seed();
        let r = analyze(&lx, "paix espoir mais guerre");
        let guerre = r.scored().find(|w| w.token == "guerre").expect("guerre");
        assert!(guerre.irony);
        assert_eq!(guerre.irony_trigger.as_deref(), Some("contrast"));
        assert!(guerre.contribution > 0.0);
    }

    #[test]
    fn analyze_does_not_mutate_lexicon() {
        let lx = seed();
        let before = lx.clone();
        let a = analyze(&lx, "La croissance reprend malgré la crise");
        let b = analyze(&lx, "La croissance reprend malgré la crise");
        assert_eq!(a, b);
        assert_eq!(lx, before);
    }

    #[test]
    fn intensity_bounded() {
        let lx = seed();
        let r = analyze(&lx, "guerre massacre terreur famine chaos");
        assert!((0.0..=1.0).contains(&r.emotional_intensity));
        assert!((0.1..=0.95).contains(&r.confidence));
    }
}

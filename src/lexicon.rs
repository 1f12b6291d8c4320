//! # Lexicon Store
//!
//! Mutable token → polarity weight mapping with per-token usage statistics
//! and a global learning rate. One instance per process, owned by the
//! [`LexiconStore`], which writes the whole document through a
//! [`LexiconPersistence`] backend after every weight change.
//!
//! - Weights are clamped to `[-2.0, 2.0]`; entries are never deleted.
//! - Usage counts only ever grow.
//! - Keys are folded (lowercase, no diacritics) on seed and on load so
//!   they compare equal to normalized tokens.
//! - On load failure the built-in [`Lexicon::default_seed`] is used and
//!   persisted; on save failure the error is logged and the in-memory
//!   state stays authoritative.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};
use tracing::{info, warn};

use crate::analyze::normalize::fold;

pub const WEIGHT_MIN: f64 = -2.0;
pub const WEIGHT_MAX: f64 = 2.0;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
pub const LEXICON_VERSION: &str = "2.0";

/// Confidence reported for a token that has never been seen.
const UNSEEN_CONFIDENCE: f64 = 0.5;
/// Usage count above which a token counts as "learned" in stats.
const LEARNED_USAGE_MIN: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default = "default_consistency")]
    pub consistency: f64,
    pub last_used: DateTime<Utc>,
}

fn default_consistency() -> f64 {
    0.5
}

impl UsageStats {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            usage_count: 0,
            consistency: default_consistency(),
            last_used: now,
        }
    }
}

/// Serialized shape of the lexicon (what the persistence backend stores).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexiconDocument {
    pub words: BTreeMap<String, f64>,
    #[serde(default)]
    pub usage_stats: BTreeMap<String, UsageStats>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

fn default_version() -> String {
    LEXICON_VERSION.to_string()
}

/// Aggregate view reported alongside snapshots and at `/api/sentiment/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub total_words: usize,
    pub learned_words: usize,
    pub total_usage: u64,
    pub average_confidence: f64,
    pub learning_rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    words: HashMap<String, f64>,
    usage: HashMap<String, UsageStats>,
    learning_rate: f64,
    version: String,
    last_updated: Option<DateTime<Utc>>,
}

#[inline]
pub fn clamp_weight(w: f64) -> f64 {
    w.clamp(WEIGHT_MIN, WEIGHT_MAX)
}

impl Lexicon {
    /// Built-in polarity words (general + geopolitical vocabulary).
    pub fn default_seed(learning_rate: f64) -> Self {
        let words = SEED_WORDS
            .iter()
            .map(|(w, s)| (fold(w), clamp_weight(*s)))
            .collect();
        Self {
            words,
            usage: HashMap::new(),
            learning_rate,
            version: LEXICON_VERSION.to_string(),
            last_updated: None,
        }
    }

    pub fn from_document(doc: LexiconDocument) -> Self {
        let words = doc
            .words
            .into_iter()
            .map(|(k, v)| (fold(&k), clamp_weight(v)))
            .collect();
        let usage = doc
            .usage_stats
            .into_iter()
            .map(|(k, v)| (fold(&k), v))
            .collect();
        Self {
            words,
            usage,
            learning_rate: doc.learning_rate,
            version: doc.version,
            last_updated: doc.last_updated,
        }
    }

    pub fn to_document(&self) -> LexiconDocument {
        LexiconDocument {
            words: self.words.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            usage_stats: self
                .usage
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            learning_rate: self.learning_rate,
            version: self.version.clone(),
            last_updated: self.last_updated,
        }
    }

    /// Weight of a token (0 when absent).
    #[inline]
    pub fn weight(&self, token: &str) -> f64 {
        self.words.get(token).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn contains(&self, token: &str) -> bool {
        self.words.contains_key(token)
    }

    /// Set a weight (clamped). Returns true if the stored value changed.
    pub fn set_weight(&mut self, token: &str, weight: f64) -> bool {
        let w = clamp_weight(weight);
        match self.words.get_mut(token) {
            Some(old) if *old == w => false,
            Some(old) => {
                *old = w;
                true
            }
            None => {
                self.words.insert(token.to_string(), w);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn usage(&self, token: &str) -> Option<&UsageStats> {
        self.usage.get(token)
    }

    pub(crate) fn usage_entry(&mut self, token: &str, now: DateTime<Utc>) -> &mut UsageStats {
        self.usage
            .entry(token.to_string())
            .or_insert_with(|| UsageStats::fresh(now))
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// `min(0.95, 0.5 + usage×0.05 + consistency×0.3)`; unseen tokens get 0.5.
    pub fn word_confidence(&self, token: &str) -> f64 {
        match self.usage.get(token) {
            None => UNSEEN_CONFIDENCE,
            Some(st) => {
                (0.5 + st.usage_count as f64 * 0.05 + st.consistency * 0.3).min(0.95)
            }
        }
    }

    pub fn learning_stats(&self) -> LearningStats {
        let learned: Vec<&str> = self
            .usage
            .iter()
            .filter(|(_, st)| st.usage_count > LEARNED_USAGE_MIN)
            .map(|(k, _)| k.as_str())
            .collect();
        let total_usage = self.usage.values().map(|st| st.usage_count).sum();
        let average_confidence = if learned.is_empty() {
            0.0
        } else {
            let sum: f64 = learned.iter().map(|w| self.word_confidence(w)).sum();
            round2(sum / learned.len() as f64)
        };

        LearningStats {
            total_words: self.words.len(),
            learned_words: learned.len(),
            total_usage,
            average_confidence,
            learning_rate: self.learning_rate,
            last_updated: self.last_updated,
            version: self.version.clone(),
        }
    }
}

#[inline]
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/* ----------------------------
Persistence
---------------------------- */

/// Storage seam for the lexicon document. Writes are whole-document.
pub trait LexiconPersistence: Send + Sync {
    fn load(&self) -> Result<LexiconDocument>;
    fn save(&self, doc: &LexiconDocument) -> Result<()>;
}

/// JSON file on local disk (pretty-printed).
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LexiconPersistence for JsonFilePersistence {
    fn load(&self) -> Result<LexiconDocument> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("reading lexicon from {}", self.path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing lexicon {}", self.path.display()))
    }

    fn save(&self, doc: &LexiconDocument) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating lexicon dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(doc).context("serializing lexicon")?;
        fs::write(&self.path, body)
            .with_context(|| format!("writing lexicon to {}", self.path.display()))
    }
}

/// In-process backend; starts empty (load fails → default seed).
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    inner: Mutex<Option<LexiconDocument>>,
    saves: Mutex<usize>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stored(&self) -> Option<LexiconDocument> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LexiconPersistence for MemoryPersistence {
    fn load(&self) -> Result<LexiconDocument> {
        self.stored()
            .ok_or_else(|| anyhow::anyhow!("no lexicon stored in memory"))
    }

    fn save(&self, doc: &LexiconDocument) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(doc.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

impl<T: LexiconPersistence + ?Sized> LexiconPersistence for std::sync::Arc<T> {
    fn load(&self) -> Result<LexiconDocument> {
        (**self).load()
    }
    fn save(&self, doc: &LexiconDocument) -> Result<()> {
        (**self).save(doc)
    }
}

/// Owner of the process-wide lexicon (single writer).
pub struct LexiconStore {
    lexicon: Lexicon,
    persistence: Box<dyn LexiconPersistence>,
    dirty: bool,
}

impl std::fmt::Debug for LexiconStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexiconStore")
            .field("words", &self.lexicon.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl LexiconStore {
    /// Load from the backend; fall back to the default seed (and persist it).
    pub fn open(persistence: Box<dyn LexiconPersistence>, default_learning_rate: f64) -> Self {
        match persistence.load() {
            Ok(doc) => {
                let lexicon = Lexicon::from_document(doc);
                info!(target: "lexicon", words = lexicon.len(), "lexicon loaded");
                Self {
                    lexicon,
                    persistence,
                    dirty: false,
                }
            }
            Err(e) => {
                warn!(target: "lexicon", error = %format!("{e:#}"), "lexicon unavailable, seeding defaults");
                let mut store = Self {
                    lexicon: Lexicon::default_seed(default_learning_rate),
                    persistence,
                    dirty: true,
                };
                store.flush();
                store
            }
        }
    }

    /// Store with the default seed and a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryPersistence::new()), DEFAULT_LEARNING_RATE)
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub(crate) fn lexicon_mut(&mut self) -> &mut Lexicon {
        &mut self.lexicon
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Write the whole lexicon. Failures are logged, never propagated.
    pub fn flush(&mut self) -> bool {
        self.lexicon.last_updated = Some(Utc::now());
        let doc = self.lexicon.to_document();
        match self.persistence.save(&doc) {
            Ok(()) => {
                self.dirty = false;
                counter!("lexicon_flush_total").increment(1);
                true
            }
            Err(e) => {
                warn!(target: "lexicon", error = %format!("{e:#}"), "lexicon write failed");
                counter!("lexicon_flush_errors_total").increment(1);
                false
            }
        }
    }

    pub fn flush_if_dirty(&mut self) {
        if self.dirty {
            self.flush();
        }
    }

    /// Throw away everything learned and persist the default seed.
    pub fn reset(&mut self) {
        let rate = self.lexicon.learning_rate;
        self.lexicon = Lexicon::default_seed(rate);
        info!(target: "lexicon", words = self.lexicon.len(), "lexicon reset to defaults");
        self.flush();
    }
}

/// Default polarity vocabulary (folded on seed).
const SEED_WORDS: &[(&str, f64)] = &[
    ("excellent", 2.0), ("exceptionnel", 2.0), ("remarquable", 2.0), ("formidable", 2.0),
    ("parfait", 2.0), ("idéal", 2.0), ("sublime", 2.0), ("magnifique", 2.0),
    ("génial", 1.8), ("fantastique", 1.8), ("incroyable", 1.8), ("merveilleux", 1.8),
    ("superbe", 1.8), ("prodige", 1.8), ("miracle", 1.8), ("phénoménal", 1.8),
    ("bon", 1.0), ("bien", 1.0), ("agréable", 1.0), ("positif", 1.0),
    ("succès", 1.0), ("réussite", 1.0), ("progrès", 1.0), ("victoire", 1.0),
    ("avancée", 1.0), ("amélioration", 1.0), ("innovation", 1.0), ("créatif", 1.0),
    ("bravo", 1.0),
    ("correct", 0.5), ("acceptable", 0.5), ("satisfaisant", 0.5), ("convenable", 0.5),
    ("passable", 0.3), ("moyen", 0.2), ("standard", 0.1),
    ("paix", 1.8), ("accord", 1.5), ("traité", 1.5), ("alliance", 1.3),
    ("coopération", 1.5), ("dialogue", 1.2), ("négociation", 1.0), ("diplomatie", 1.2),
    ("réconciliation", 1.8), ("cessez-le-feu", 1.5), ("résolution", 1.3),
    ("entente", 1.4), ("partenariat", 1.2), ("solidarité", 1.5), ("aide", 1.0),
    ("soutien", 1.0), ("espoir", 1.3), ("stabilité", 1.3), ("sécurité", 1.2),
    ("libération", 1.5), ("démocratie", 1.2), ("liberté", 1.5), ("justice", 1.3),
    ("développement", 1.0), ("reconstruction", 1.2), ("relance", 1.1),
    ("croissance", 1.0), ("reprise", 1.1), ("investissement", 0.8),
    ("catastrophe", -2.0), ("désastre", -2.0), ("horrible", -2.0), ("épouvantable", -2.0),
    ("terrible", -2.0), ("abominable", -2.0), ("exécrable", -2.0), ("atroce", -2.0),
    ("affreux", -1.8), ("détestable", -1.8), ("ignoble", -1.8), ("infâme", -1.8),
    ("odieux", -1.8), ("méprisable", -1.8), ("haïssable", -1.8), ("immonde", -1.8),
    ("mauvais", -1.0), ("négatif", -1.0), ("problème", -1.0), ("échec", -1.0),
    ("difficile", -1.0), ("compliqué", -1.0), ("crise", -1.0), ("danger", -1.0),
    ("risque", -1.0), ("menace", -1.0), ("défaite", -1.0),
    ("décevant", -0.7), ("médiocre", -0.7), ("insuffisant", -0.7), ("faible", -0.7),
    ("limité", -0.5), ("incomplet", -0.5), ("imparfait", -0.3), ("perfectible", -0.2),
    ("guerre", -2.0), ("conflit", -1.8), ("violence", -1.8), ("attaque", -1.8),
    ("bombardement", -2.0), ("invasion", -2.0), ("occupation", -1.8),
    ("tension", -1.3), ("escalade", -1.5), ("hostilité", -1.6), ("antagonisme", -1.4),
    ("sanction", -1.3), ("embargo", -1.5), ("blocus", -1.6), ("répression", -1.8),
    ("violation", -1.5), ("abus", -1.6), ("torture", -2.0), ("massacre", -2.0),
    ("génocide", -2.0), ("crimes", -1.8), ("terreur", -2.0), ("terrorisme", -2.0),
    ("instabilité", -1.4), ("chaos", -1.8), ("anarchie", -1.7), ("désordre", -1.3),
    ("corruption", -1.6), ("autoritarisme", -1.5), ("dictature", -1.8),
    ("oppression", -1.8), ("censure", -1.4), ("persécution", -1.8),
    ("famine", -2.0), ("pauvreté", -1.5), ("exode", -1.4), ("réfugiés", -1.3),
    ("déstabilisation", -1.6), ("rupture", -1.2), ("blocage", -1.3),
    ("impasse", -1.4), ("stagnation", -1.1),
];

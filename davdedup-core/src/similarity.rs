//! Pairwise "same entity?" decisions.
//!
//! Two strategies exist and are selected explicitly:
//! - [`MatchStrategy::Fuzzy`] compares names/titles with an edit-distance ratio.
//!   Only available when the crate is built with the `fuzzy` feature.
//! - [`MatchStrategy::Exact`] only accepts identical normalized values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DedupError, DedupResult};
use crate::normalize::fold;
use crate::record::Record;

/// Default minimum ratio for two names to be considered the same person.
pub const DEFAULT_THRESHOLD: u8 = 85;

/// Titles this short are only ever compared for equality.
const MIN_FUZZY_TITLE_LEN: usize = 4;

/// Similarity threshold in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Threshold(u8);

impl Threshold {
    pub fn new(value: i64) -> DedupResult<Self> {
        if !(0..=100).contains(&value) {
            return Err(DedupError::Config(format!(
                "similarity threshold must be between 0 and 100, got {}",
                value
            )));
        }
        Ok(Threshold(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(DEFAULT_THRESHOLD)
    }
}

impl TryFrom<i64> for Threshold {
    type Error = DedupError;

    fn try_from(value: i64) -> DedupResult<Self> {
        Threshold::new(value)
    }
}

impl From<Threshold> for i64 {
    fn from(t: Threshold) -> i64 {
        t.0 as i64
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Fuzzy,
    Exact,
}

impl Default for MatchStrategy {
    fn default() -> Self {
        if fuzzy_available() {
            MatchStrategy::Fuzzy
        } else {
            MatchStrategy::Exact
        }
    }
}

impl MatchStrategy {
    /// The strategy that will actually run. Asking for `Fuzzy` in a build
    /// without the `fuzzy` feature degrades to `Exact` with a warning.
    pub fn resolve(self) -> MatchStrategy {
        match self {
            MatchStrategy::Fuzzy if !fuzzy_available() => {
                log::warn!("fuzzy matching not compiled in, using the exact strategy");
                MatchStrategy::Exact
            }
            other => other,
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::Fuzzy => write!(f, "fuzzy"),
            MatchStrategy::Exact => write!(f, "exact"),
        }
    }
}

/// Whether this build can compute partial similarity.
pub const fn fuzzy_available() -> bool {
    cfg!(feature = "fuzzy")
}

/// Edit-distance ratio between two strings, `0..=100`, case-folded.
#[cfg(feature = "fuzzy")]
pub fn ratio(a: &str, b: &str) -> u8 {
    let score = strsim::normalized_levenshtein(&fold(a), &fold(b));
    (score * 100.0).round() as u8
}

/// Name similarity used outside clustering (birthday matching). Always
/// false when fuzzy matching is unavailable.
#[cfg(feature = "fuzzy")]
pub fn similar(a: &str, b: &str, min: u8) -> bool {
    !a.is_empty() && !b.is_empty() && ratio(a, b) >= min
}

#[cfg(not(feature = "fuzzy"))]
pub fn similar(_a: &str, _b: &str, _min: u8) -> bool {
    false
}

/// Which signals may declare two contacts duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    pub by_email: bool,
    pub by_phone: bool,
    pub by_name_similarity: bool,
}

impl Default for MatchRules {
    fn default() -> Self {
        MatchRules {
            by_email: true,
            by_phone: true,
            by_name_similarity: true,
        }
    }
}

/// Decides whether two records denote the same entity.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    strategy: MatchStrategy,
    threshold: Threshold,
    rules: MatchRules,
}

impl Matcher {
    pub fn new(strategy: MatchStrategy, threshold: Threshold, rules: MatchRules) -> Self {
        Matcher {
            strategy: strategy.resolve(),
            threshold,
            rules,
        }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn rules(&self) -> MatchRules {
        self.rules
    }

    pub fn is_duplicate(&self, a: &Record, b: &Record) -> bool {
        if a.is_event() || b.is_event() {
            self.events_match(a, b)
        } else {
            self.contacts_match(a, b)
        }
    }

    /// Email, then phone, then name. First signal that fires wins. The exact
    /// strategy has no phone signal.
    fn contacts_match(&self, a: &Record, b: &Record) -> bool {
        if self.rules.by_email && intersects(&a.emails, &b.emails) {
            return true;
        }

        if self.strategy != MatchStrategy::Exact
            && self.rules.by_phone
            && intersects(&a.phones, &b.phones)
        {
            return true;
        }

        if self.rules.by_name_similarity && a.has_name() && b.has_name() {
            return self.names_match(&a.name, &b.name);
        }

        false
    }

    fn names_match(&self, a: &str, b: &str) -> bool {
        match self.strategy {
            #[cfg(feature = "fuzzy")]
            MatchStrategy::Fuzzy => ratio(a, b) >= self.threshold.value(),
            _ => fold(a) == fold(b),
        }
    }

    /// Same calendar day is required; then equal titles, or similar enough
    /// titles under the fuzzy strategy.
    fn events_match(&self, a: &Record, b: &Record) -> bool {
        if !a.has_name() || !b.has_name() {
            return false;
        }

        let (Some(day_a), Some(day_b)) = (a.start_date(), b.start_date()) else {
            return false;
        };
        if day_a != day_b {
            return false;
        }

        if fold(&a.name) == fold(&b.name) {
            return true;
        }

        match self.strategy {
            #[cfg(feature = "fuzzy")]
            MatchStrategy::Fuzzy => {
                a.name.chars().count() >= MIN_FUZZY_TITLE_LEN
                    && b.name.chars().count() >= MIN_FUZZY_TITLE_LEN
                    && ratio(&a.name, &b.name) >= self.threshold.value()
            }
            _ => false,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::new(MatchStrategy::default(), Threshold::default(), MatchRules::default())
    }
}

fn intersects(a: &[String], b: &[String]) -> bool {
    a.iter().any(|x| b.contains(x))
}

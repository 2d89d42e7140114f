//! Keyword classification of event titles.

use serde::{Deserialize, Serialize};

use crate::error::{DedupError, DedupResult};
use crate::normalize::fold;

/// Default minimum similarity between an event's name and a contact's name.
pub const DEFAULT_NAME_SIMILARITY: u8 = 80;

/// Terms that rule an event out of birthday semantics, whatever else it says.
const EXCLUDE: &[&str] = &[
    "réunion",
    "meeting",
    "rendez-vous",
    "rdv",
    "appointment",
    "déjeuner",
    "dîner",
    "restaurant",
    "déménagement",
    "visite",
    "leçon",
    "championnat",
    "résilier",
    "surprise",
    "fête",
];

const INCLUDE: &[&str] = &[
    "anniversaire",
    "birthday",
    "naissance",
    "date de naissance",
    "bday",
    "né le",
    "née le",
    "born on",
    "anniversary",
];

/// Leading phrases stripped from a birthday title to get the person's name.
/// Tried in order, first hit only.
const PREFIXES: &[&str] = &[
    "anniversaire de ",
    "anniversary of ",
    "birthday of ",
    "anniversaire ",
    "birthday ",
    "anniversary ",
    "date de naissance : ",
];

/// What the keywords say about an event title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventClass {
    NonBirthday,
    BirthdayTyped,
}

/// Data-driven keyword sets used to classify and parse birthday events.
/// Keywords are matched as case-folded substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthdayRules {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub prefixes: Vec<String>,
    pub name_similarity: u8,
}

impl Default for BirthdayRules {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        BirthdayRules {
            exclude: owned(EXCLUDE),
            include: owned(INCLUDE),
            prefixes: owned(PREFIXES),
            name_similarity: DEFAULT_NAME_SIMILARITY,
        }
    }
}

impl BirthdayRules {
    pub fn validate(&self) -> DedupResult<()> {
        if self.name_similarity > 100 {
            return Err(DedupError::Config(format!(
                "birthday name similarity must be between 0 and 100, got {}",
                self.name_similarity
            )));
        }
        if self.include.iter().all(|k| k.trim().is_empty()) {
            return Err(DedupError::Config(
                "at least one birthday keyword is required".into(),
            ));
        }
        Ok(())
    }

    /// Exclusion keywords are checked first and always win.
    pub fn classify(&self, title: &str) -> EventClass {
        let title = fold(title);

        if contains_any(&title, &self.exclude) {
            return EventClass::NonBirthday;
        }

        if contains_any(&title, &self.include) {
            EventClass::BirthdayTyped
        } else {
            EventClass::NonBirthday
        }
    }

    /// Folded title with the first matching prefix removed.
    pub fn extract_name(&self, title: &str) -> String {
        let title = fold(title);

        for prefix in &self.prefixes {
            let prefix = fold_keep_trailing_space(prefix);
            if let Some(rest) = title.strip_prefix(prefix.as_str()) {
                return rest.trim().to_string();
            }
        }

        title
    }
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| {
        let k = fold(k);
        !k.is_empty() && haystack.contains(&k)
    })
}

/// Prefixes end with a space that separates them from the name; `fold` would
/// trim it and "anniversaire " would then also strip "anniversaires".
fn fold_keep_trailing_space(prefix: &str) -> String {
    let folded = fold(prefix);
    if prefix.ends_with(' ') {
        format!("{} ", folded)
    } else {
        folded
    }
}

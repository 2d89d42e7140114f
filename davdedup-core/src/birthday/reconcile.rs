//! Matching birthday events against birthday entries.

use serde::Serialize;

use crate::birthday::entry::{BirthdayEntry, MonthDay};
use crate::birthday::rules::{BirthdayRules, EventClass};
use crate::normalize::fold_alphanumeric;
use crate::record::Record;
use crate::similarity;

/// An event paired with the entry it celebrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BirthdayMatch {
    pub event: usize,
    pub entry: usize,
}

/// Outcome of [`reconcile`]. Event and entry fields hold indices into the
/// slices passed in; every event lands in exactly one of `matched`,
/// `orphans` and `non_birthday`, every entry in `matched` or `missing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub matched: Vec<BirthdayMatch>,
    /// Birthday-typed events that match no entry
    pub orphans: Vec<usize>,
    /// Events the keywords exclude from birthday semantics
    pub non_birthday: Vec<usize>,
    /// Entries no event matched
    pub missing: Vec<usize>,
}

impl Reconciliation {
    pub fn is_in_sync(&self) -> bool {
        self.orphans.is_empty() && self.missing.is_empty()
    }

    /// The entry an event was matched to, if any.
    pub fn entry_for(&self, event: usize) -> Option<usize> {
        self.matched.iter().find(|m| m.event == event).map(|m| m.entry)
    }
}

/// Classify every event and pair birthday-typed ones with entries.
///
/// For each birthday event, entries are tried in order and the first one
/// whose name matches (containment either way, or similarity at least
/// `rules.name_similarity`) and whose day matches the event start wins.
/// An event without a start date is matched on the name alone.
///
/// An entry with the same name and day as a matched entry counts as
/// matched too, so repeated contacts never stay missing.
pub fn reconcile(
    entries: &[BirthdayEntry],
    events: &[Record],
    rules: &BirthdayRules,
) -> Reconciliation {
    let mut result = Reconciliation::default();
    let mut entry_matched = vec![false; entries.len()];

    let keys: Vec<_> = entries.iter().map(BirthdayEntry::key).collect();

    for (event_idx, event) in events.iter().enumerate() {
        if rules.classify(&event.name) == EventClass::NonBirthday {
            log::debug!("not a birthday: {}", event.name);
            result.non_birthday.push(event_idx);
            continue;
        }

        let candidate = rules.extract_name(&event.name);
        let event_day = event.start_date().map(MonthDay::from);

        let found = entries.iter().enumerate().position(|(i, entry)| {
            names_match(&candidate, &keys[i].0, rules.name_similarity)
                && event_day.is_none_or(|day| day == entry.date)
        });

        match found {
            Some(entry_idx) => {
                log::debug!("{} <-> {}", event.name, entries[entry_idx].name);
                for (i, key) in keys.iter().enumerate() {
                    if *key == keys[entry_idx] {
                        entry_matched[i] = true;
                    }
                }
                result.matched.push(BirthdayMatch {
                    event: event_idx,
                    entry: entry_idx,
                });
            }
            None => {
                log::debug!("orphan birthday event: {}", event.name);
                result.orphans.push(event_idx);
            }
        }
    }

    result.missing = (0..entries.len()).filter(|i| !entry_matched[*i]).collect();

    log::info!(
        "{} matched, {} orphan(s), {} non-birthday event(s), {} missing birthday(s)",
        result.matched.len(),
        result.orphans.len(),
        result.non_birthday.len(),
        result.missing.len()
    );

    result
}

/// `candidate` and `name` are already folded.
fn names_match(candidate: &str, name: &str, min_similarity: u8) -> bool {
    if candidate.is_empty() || name.is_empty() {
        return false;
    }

    name.contains(candidate)
        || candidate.contains(name)
        || similarity::similar(
            &fold_alphanumeric(candidate),
            &fold_alphanumeric(name),
            min_similarity,
        )
}

//! Birthday calendar reconciliation.
//!
//! Matches events of a birthday calendar against contacts' birth dates:
//! - events are first classified with keyword [`BirthdayRules`]
//! - birthday-typed events are matched to [`BirthdayEntry`]s by name and day
//! - unmatched birthday events are orphans, unmatched entries are missing

mod entry;
mod reconcile;
mod rules;

pub use entry::{BirthdayEntry, MonthDay, UNNAMED_CONTACT};
pub use reconcile::{BirthdayMatch, Reconciliation, reconcile};
pub use rules::{BirthdayRules, EventClass};

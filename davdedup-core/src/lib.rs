//! Duplicate detection and birthday reconciliation for address books and
//! calendars.
//!
//! The crate works on [`Record`]s parsed from vCard or iCalendar text:
//! - [`plan_deduplication`] groups records that denote the same contact or
//!   event and elects the one to keep
//! - [`plan_birthdays`] matches a birthday calendar against contact birth
//!   dates and synthesizes the missing events
//! - [`apply_deduplication`] / [`apply_birthdays`] carry a plan out against a
//!   [`RecordStore`]
//!
//! No I/O happens here apart from what a `RecordStore` does. Diagnostics go
//! through the `log` facade.

pub mod birthday;
pub mod cluster;
pub mod error;
pub mod ics;
pub mod normalize;
pub mod plan;
pub mod record;
pub mod similarity;
pub mod survivor;
pub mod vcard;
pub mod vcf;

pub use birthday::{BirthdayEntry, BirthdayRules, EventClass, MonthDay, Reconciliation};
pub use cluster::ClusterPolicy;
pub use error::{DedupError, DedupResult};
pub use ics::BirthdayEvent;
pub use plan::{
    ApplyReport, BirthdayPlan, DedupOptions, DeduplicationPlan, Disposition, Failure, PlanEntry,
    RecordStore, apply_birthdays, apply_deduplication, plan_birthdays, plan_deduplication,
};
pub use record::{ContactDetails, EventDetails, EventTime, Record, RecordDetails};
pub use similarity::{MatchRules, MatchStrategy, Matcher, Threshold};
pub use survivor::{DuplicateGroup, SelectionWeights};

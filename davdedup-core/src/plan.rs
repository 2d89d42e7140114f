//! Deletion and creation plans, and their execution against a store.
//!
//! Planning is pure. Nothing touches the remote side until a plan is handed
//! to [`apply_deduplication`] or [`apply_birthdays`] together with a
//! [`RecordStore`]; a dry run simply never does that.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::birthday::{BirthdayEntry, BirthdayRules, Reconciliation, reconcile};
use crate::cluster::{ClusterPolicy, cluster};
use crate::error::{DedupError, DedupResult};
use crate::ics::{BirthdayEvent, birthday_event};
use crate::record::Record;
use crate::similarity::{MatchRules, MatchStrategy, Matcher, Threshold};
use crate::survivor::{DuplicateGroup, SelectionWeights};

/// Default number of attempts for each store call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Everything that drives duplicate detection and survivor election.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupOptions {
    pub strategy: MatchStrategy,
    pub threshold: Threshold,
    pub rules: MatchRules,
    pub policy: ClusterPolicy,
    pub weights: SelectionWeights,
}

impl DedupOptions {
    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.strategy, self.threshold, self.rules)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Keep,
    Delete,
}

/// One line of a deduplication plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    /// Index of the group in [`DeduplicationPlan::groups`]
    pub group: usize,
    /// Index into the planned records
    pub record: usize,
    pub disposition: Disposition,
}

/// Duplicate groups with their survivors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeduplicationPlan {
    pub groups: Vec<DuplicateGroup>,
    /// Number of records the plan was computed over
    pub record_count: usize,
}

impl DeduplicationPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Records that belong to some group.
    pub fn total_in_groups(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }

    pub fn to_delete(&self) -> usize {
        self.total_in_groups() - self.groups.len()
    }

    /// Every grouped record, group by group, in input order within a group.
    pub fn entries(&self) -> impl Iterator<Item = PlanEntry> + '_ {
        self.groups.iter().enumerate().flat_map(|(g, group)| {
            group.members.iter().map(move |&record| PlanEntry {
                group: g,
                record,
                disposition: if record == group.survivor {
                    Disposition::Keep
                } else {
                    Disposition::Delete
                },
            })
        })
    }

    /// Indices of the records to delete.
    pub fn deletions(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().flat_map(DuplicateGroup::losers)
    }
}

/// Cluster `records` and elect a survivor in each group.
pub fn plan_deduplication(records: &[Record], options: &DedupOptions) -> DeduplicationPlan {
    let matcher = options.matcher();
    let groups: Vec<DuplicateGroup> = cluster(records, &matcher, options.policy)
        .into_iter()
        .filter_map(|members| DuplicateGroup::elect(records, members, &options.weights))
        .collect();

    let plan = DeduplicationPlan {
        groups,
        record_count: records.len(),
    };

    log::info!(
        "{} duplicate group(s), {} record(s) involved, {} to delete",
        plan.groups.len(),
        plan.total_in_groups(),
        plan.to_delete()
    );

    plan
}

/// Birthday calendar changes: orphan events to delete, events to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BirthdayPlan {
    pub reconciliation: Reconciliation,
    /// One event per missing entry, in entry order
    pub to_create: Vec<BirthdayEvent>,
}

impl BirthdayPlan {
    pub fn is_empty(&self) -> bool {
        self.reconciliation.orphans.is_empty() && self.to_create.is_empty()
    }

    /// Indices of the events to delete.
    pub fn deletions(&self) -> &[usize] {
        &self.reconciliation.orphans
    }
}

/// Reconcile `events` against `entries` and synthesize the missing
/// birthdays as events first occurring in `year`.
///
/// Without any entry nothing is planned: every birthday event would
/// otherwise be an orphan. Missing entries sharing a name and day get a
/// single event.
pub fn plan_birthdays(
    entries: &[BirthdayEntry],
    events: &[Record],
    rules: &BirthdayRules,
    year: i32,
) -> DedupResult<BirthdayPlan> {
    if entries.is_empty() {
        log::warn!("no contact with a birth date, leaving the calendar alone");
        return Ok(BirthdayPlan {
            reconciliation: Reconciliation::default(),
            to_create: Vec::new(),
        });
    }

    let reconciliation = reconcile(entries, events, rules);

    let mut planned = HashSet::new();
    let to_create = reconciliation
        .missing
        .iter()
        .map(|&i| &entries[i])
        .filter(|entry| planned.insert(entry.key()))
        .map(|entry| birthday_event(entry, year))
        .collect::<DedupResult<Vec<_>>>()?;

    Ok(BirthdayPlan {
        reconciliation,
        to_create,
    })
}

/// The remote side of a cleanup.
pub trait RecordStore {
    fn delete(&mut self, record: &Record) -> DedupResult<()>;

    fn create_event(&mut self, event: &BirthdayEvent) -> DedupResult<()>;

    /// Called after failed attempt number `attempt`, before the next one.
    fn before_retry(&mut self, _attempt: u32) {}
}

/// A store call that still failed after every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub id: String,
    pub reason: String,
    pub attempts: u32,
}

/// What happened when a plan was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Identifiers of deleted records
    pub deleted: Vec<String>,
    /// UIDs of created events
    pub created: Vec<String>,
    pub failed: Vec<Failure>,
}

impl ApplyReport {
    pub fn succeeded(&self) -> usize {
        self.deleted.len() + self.created.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every non-survivor, one at a time.
///
/// A failed call is retried up to `max_attempts` attempts in total; a record
/// that still fails is reported and the run moves on.
pub fn apply_deduplication<S: RecordStore + ?Sized>(
    plan: &DeduplicationPlan,
    records: &[Record],
    store: &mut S,
    max_attempts: u32,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    delete_all(plan.deletions(), records, store, max_attempts, &mut report);
    log_report(&report);
    report
}

/// Delete orphan events, then create missing birthdays.
pub fn apply_birthdays<S: RecordStore + ?Sized>(
    plan: &BirthdayPlan,
    events: &[Record],
    store: &mut S,
    max_attempts: u32,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    delete_all(
        plan.deletions().iter().copied(),
        events,
        store,
        max_attempts,
        &mut report,
    );

    for event in &plan.to_create {
        match with_retries(store, max_attempts, |s| s.create_event(event)) {
            Ok(()) => {
                log::info!("created {} ({})", event.summary, event.date);
                report.created.push(event.uid.clone());
            }
            Err((attempts, e)) => {
                log::error!("could not create {}: {}", event.summary, e);
                report.failed.push(Failure {
                    id: event.uid.clone(),
                    reason: e.to_string(),
                    attempts,
                });
            }
        }
    }

    log_report(&report);
    report
}

fn delete_all<S, I>(
    indices: I,
    records: &[Record],
    store: &mut S,
    max_attempts: u32,
    report: &mut ApplyReport,
) where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = usize>,
{
    for idx in indices {
        let record = &records[idx];
        match with_retries(store, max_attempts, |s| s.delete(record)) {
            Ok(()) => {
                log::info!("deleted {}", record);
                report.deleted.push(record.id.clone());
            }
            Err((attempts, e)) => {
                log::error!("could not delete {}: {}", record, e);
                report.failed.push(Failure {
                    id: record.id.clone(),
                    reason: e.to_string(),
                    attempts,
                });
            }
        }
    }
}

/// Run `op` until it succeeds or `max_attempts` (at least one) is reached.
fn with_retries<S, F>(store: &mut S, max_attempts: u32, mut op: F) -> Result<(), (u32, DedupError)>
where
    S: RecordStore + ?Sized,
    F: FnMut(&mut S) -> DedupResult<()>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(store) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_attempts => {
                log::warn!("attempt {}/{} failed: {}", attempt, max_attempts, e);
                store.before_retry(attempt);
                attempt += 1;
            }
            Err(e) => return Err((attempt, e)),
        }
    }
}

fn log_report(report: &ApplyReport) {
    if report.is_complete() {
        log::info!("{} operation(s) succeeded", report.succeeded());
    } else {
        log::warn!(
            "{} operation(s) succeeded, {} failed",
            report.succeeded(),
            report.failed.len()
        );
    }
}

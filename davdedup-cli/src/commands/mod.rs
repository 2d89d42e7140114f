pub mod birthdays;
pub mod calendars;
pub mod contacts;
pub mod file;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use davdedup_core::{
    ApplyReport, DedupOptions, DeduplicationPlan, Record, apply_deduplication,
    plan_deduplication,
};
use owo_colors::OwoColorize;
use serde_json::json;

use crate::backup::Backup;
use crate::config::Settings;
use crate::dav::{Collection, CollectionKind, DavClient, DavObject, DavStore};
use crate::render::{PlanRender, Render};
use crate::utils::tui;

/// How a run should behave once a plan is computed.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Actually delete / create; dry run otherwise
    pub apply: bool,
    pub confirm: bool,
    pub json: bool,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Root of the backup directories, `None` to delete without a copy
    pub backup_root: Option<PathBuf>,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings, apply: bool, yes: bool, json: bool) -> Result<Self> {
        Ok(RunOptions {
            apply,
            confirm: settings.safety.require_confirmation && !yes,
            json,
            max_attempts: settings.advanced.max_retry_attempts,
            retry_delay: Duration::from_secs(settings.advanced.retry_delay_secs),
            backup_root: settings.safety.backup_root()?,
        })
    }

    /// Store used to apply a plan. The backup directory is only created
    /// here, once the user has agreed to change something.
    pub fn store<'a>(
        &self,
        client: &'a DavClient,
        originals: &'a HashMap<String, String>,
    ) -> Result<DavStore<'a>> {
        let store = DavStore::new(client).retry_delay(self.retry_delay);
        match self.backup_root {
            Some(ref root) => Ok(store.with_backup(Backup::create(root)?, originals)),
            None => Ok(store),
        }
    }
}

pub fn connect(settings: &Settings) -> Result<DavClient> {
    settings.validate_server()?;
    let password = settings.password()?;
    DavClient::new(&settings.server, password)
}

/// Collections of `kind`, optionally narrowed to one by name.
pub fn select_collections(
    client: &DavClient,
    kind: CollectionKind,
    name: Option<&str>,
) -> Result<Vec<Collection>> {
    let spinner = tui::create_spinner("Discovering collections".to_string());
    let result = client.collections(kind);
    spinner.finish_and_clear();
    let collections = result?;

    match name {
        Some(name) => match find_collection(&collections, name) {
            Some(c) => Ok(vec![c.clone()]),
            None => {
                let available: Vec<_> = collections.iter().map(|c| c.name.as_str()).collect();
                anyhow::bail!(
                    "Calendar '{}' not found. Available: {}",
                    name,
                    available.join(", ")
                );
            }
        },
        None => Ok(collections),
    }
}

/// Case-insensitive lookup by display name.
pub fn find_collection<'a>(collections: &'a [Collection], name: &str) -> Option<&'a Collection> {
    collections
        .iter()
        .find(|c| c.name.to_lowercase() == name.to_lowercase())
}

/// Fetch every object of every collection, one spinner per collection.
pub fn fetch_objects(
    client: &DavClient,
    collections: &[Collection],
    kind: CollectionKind,
) -> Result<Vec<(Collection, Vec<DavObject>)>> {
    fetch_all(collections, |collection| {
        let spinner = tui::create_spinner(collection.render());
        let result = client.objects(collection, kind);
        spinner.finish_and_clear();
        result
    })
}

/// Stops at the first collection that cannot be fetched. Records are only
/// compared once every collection has been read.
fn fetch_all<F>(
    collections: &[Collection],
    mut fetch: F,
) -> Result<Vec<(Collection, Vec<DavObject>)>>
where
    F: FnMut(&Collection) -> Result<Vec<DavObject>>,
{
    collections
        .iter()
        .map(|collection| {
            let objects = fetch(collection).with_context(|| {
                format!("Could not read {}, nothing was changed", collection.name)
            })?;
            Ok((collection.clone(), objects))
        })
        .collect()
}

/// Server text of each object, by href.
pub fn originals<'a, I>(objects: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a DavObject>,
{
    objects
        .into_iter()
        .map(|o| (o.href.clone(), o.data.clone()))
        .collect()
}

/// Plan, show, confirm and apply a deduplication over `records`.
pub fn deduplicate(
    client: &DavClient,
    records: &[Record],
    originals: &HashMap<String, String>,
    options: &DedupOptions,
    run: &RunOptions,
    noun: &str,
) -> Result<()> {
    let plan = plan_deduplication(records, options);

    if run.json {
        println!("{}", plan_json(&plan, records)?);
    } else {
        println!("{}", plan.render(records));
    }

    if plan.is_empty() {
        return Ok(());
    }

    let count = plan.to_delete();
    if !run.apply {
        if !run.json {
            println!(
                "\n{}",
                format!(
                    "Dry run: {} {} would be deleted (use --delete to apply)",
                    count,
                    tui::pluralize(noun, count)
                )
                .dimmed()
            );
        }
        return Ok(());
    }

    if run.confirm
        && !tui::confirm(format!("Delete {} {}?", count, tui::pluralize(noun, count)))?
    {
        return Ok(());
    }

    let mut store = run.store(client, originals)?;
    let report = apply_deduplication(&plan, records, &mut store, run.max_attempts);
    finish(&report, run)
}

/// Print the outcome of an apply; failures make the run fail.
pub fn finish(report: &ApplyReport, run: &RunOptions) -> Result<()> {
    if run.json {
        let out = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", out);
    } else {
        println!("\n{}", report.render());
    }

    if !report.is_complete() {
        let failed = report.failed.len();
        anyhow::bail!("{} {} failed", failed, tui::pluralize("operation", failed));
    }

    Ok(())
}

fn plan_json(plan: &DeduplicationPlan, records: &[Record]) -> Result<String> {
    let entries: Vec<_> = plan
        .entries()
        .map(|entry| {
            json!({
                "group": entry.group + 1,
                "disposition": entry.disposition,
                "record": &records[entry.record],
            })
        })
        .collect();

    let value = json!({
        "records": plan.record_count,
        "groups": plan.groups.len(),
        "to_delete": plan.to_delete(),
        "entries": entries,
    });

    serde_json::to_string_pretty(&value).context("Failed to serialize plan")
}

use anyhow::Result;
use davdedup_core::{Record, ics};
use owo_colors::OwoColorize;

use super::{RunOptions, connect, deduplicate, fetch_objects, originals, select_collections};
use crate::config::Settings;
use crate::dav::{Collection, CollectionKind, DavObject};

/// Deduplicate events. Without `calendar`, events of every calendar are
/// compared with each other.
pub fn run(settings: &Settings, calendar: Option<&str>, run: RunOptions) -> Result<()> {
    let options = settings.dedup_options()?;
    let client = connect(settings)?;

    let calendars = select_collections(&client, CollectionKind::Calendar, calendar)?;
    let fetched = fetch_objects(&client, &calendars, CollectionKind::Calendar)?;
    let records = event_records(&fetched);

    if !run.json {
        println!(
            "{}",
            format!("{} events in {} calendars", records.len(), fetched.len()).dimmed()
        );
    }

    let originals = originals(fetched.iter().flat_map(|(_, objects)| objects));
    deduplicate(&client, &records, &originals, &options, &run, "event")
}

pub fn event_records(fetched: &[(Collection, Vec<DavObject>)]) -> Vec<Record> {
    fetched
        .iter()
        .flat_map(|(collection, objects)| {
            ics::parse_all(
                Some(collection.name.as_str()),
                objects.iter().map(|o| (o.href.as_str(), o.data.as_str())),
            )
        })
        .collect()
}

use anyhow::{Context, Result};
use chrono::Datelike;
use davdedup_core::{BirthdayEntry, apply_birthdays, ics, plan_birthdays};
use owo_colors::OwoColorize;

use super::contacts::fetch_contacts;
use super::{RunOptions, connect, finish, originals, select_collections};
use crate::config::Settings;
use crate::dav::CollectionKind;
use crate::render::{PlanRender, Render};
use crate::utils::tui;

/// Bring the birthday calendar in line with the birthdays of the contacts.
pub fn run(settings: &Settings, calendar: Option<&str>, run: RunOptions) -> Result<()> {
    let name = calendar.unwrap_or(&settings.birthdays.calendar);
    let client = connect(settings)?;

    let contacts = fetch_contacts(&client)?;
    let entries = BirthdayEntry::collect(&contacts);

    // Without a single birth date every birthday event would look orphaned
    if entries.is_empty() {
        if !run.json {
            println!(
                "{}",
                format!(
                    "No birthday among {} contacts, leaving the calendar alone",
                    contacts.len()
                )
                .dimmed()
            );
        }
        return Ok(());
    }

    let target = select_collections(&client, CollectionKind::Calendar, Some(name))?
        .into_iter()
        .next()
        .with_context(|| format!("Calendar '{}' not found", name))?;

    // A calendar that cannot be read must not be treated as empty
    let spinner = tui::create_spinner(target.render());
    let result = client.objects(&target, CollectionKind::Calendar);
    spinner.finish_and_clear();
    let objects = result?;

    let events = ics::parse_all(
        Some(target.name.as_str()),
        objects.iter().map(|o| (o.href.as_str(), o.data.as_str())),
    );

    let plan = plan_birthdays(
        &entries,
        &events,
        &settings.birthdays.rules,
        chrono::Local::now().year(),
    )?;

    if run.json {
        let out = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
        println!("{}", out);
    } else {
        println!(
            "{}",
            format!(
                "{} contacts with a birthday, {} events in {}",
                entries.len(),
                events.len(),
                target.name
            )
            .dimmed()
        );
        println!("{}", target.render());
        println!("{}", plan.render(&events));
    }

    if plan.is_empty() {
        return Ok(());
    }

    let deletes = plan.deletions().len();
    let creates = plan.to_create.len();

    if !run.apply {
        if !run.json {
            println!(
                "\n{}",
                format!(
                    "Dry run: {} {} to delete, {} to create (use --delete to apply)",
                    deletes,
                    tui::pluralize("event", deletes),
                    creates
                )
                .dimmed()
            );
        }
        return Ok(());
    }

    if run.confirm
        && !tui::confirm(format!(
            "Delete {} and create {} {} in {}?",
            deletes,
            creates,
            tui::pluralize("event", creates),
            target.name
        ))?
    {
        return Ok(());
    }

    let originals = originals(&objects);
    let mut store = run.store(&client, &originals)?.in_calendar(&target);
    let report = apply_birthdays(&plan, &events, &mut store, run.max_attempts);
    finish(&report, &run)
}

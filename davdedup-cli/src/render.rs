//! TUI rendering traits for plans and reports.
//!
//! Extension traits that add colored terminal rendering to davdedup-core
//! types using owo_colors.

use davdedup_core::plan::{BirthdayPlan, Disposition};
use davdedup_core::{ApplyReport, DeduplicationPlan, Record};
use owo_colors::OwoColorize;

use crate::dav::Collection;
use crate::utils::tui::pluralize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for Disposition {
    fn render(&self) -> String {
        match self {
            Disposition::Keep => "[KEEP]  ".green().to_string(),
            Disposition::Delete => "[DELETE]".red().to_string(),
        }
    }
}

impl Render for Collection {
    fn render(&self) -> String {
        format!("📁 {}", self.name)
    }
}

impl Render for ApplyReport {
    fn render(&self) -> String {
        let mut lines = Vec::new();

        if !self.deleted.is_empty() {
            lines.push(format!(
                "Deleted {} {}",
                self.deleted.len(),
                pluralize("record", self.deleted.len())
            ));
        }
        if !self.created.is_empty() {
            lines.push(format!(
                "Created {} {}",
                self.created.len(),
                pluralize("event", self.created.len())
            ));
        }
        for failure in &self.failed {
            lines.push(format!(
                "{} {} ({} after {} {})",
                "Failed".red(),
                failure.id,
                failure.reason.red(),
                failure.attempts,
                pluralize("attempt", failure.attempts as usize)
            ));
        }

        if lines.is_empty() {
            return "Nothing was changed".dimmed().to_string();
        }
        lines.join("\n")
    }
}

/// Rendering that needs the records a plan indexes into.
pub trait PlanRender {
    fn render(&self, records: &[Record]) -> String;
}

impl PlanRender for DeduplicationPlan {
    fn render(&self, records: &[Record]) -> String {
        if self.is_empty() {
            return format!(
                "   No duplicates among {} {}",
                self.record_count,
                pluralize("record", self.record_count)
            )
            .dimmed()
            .to_string();
        }

        let mut lines = Vec::new();
        let mut current = None;

        for entry in self.entries() {
            if current != Some(entry.group) {
                if current.is_some() {
                    lines.push(String::new());
                }
                current = Some(entry.group);
                let size = self.groups[entry.group].len();
                lines.push(
                    format!("   Group {} ({} {})", entry.group + 1, size, pluralize("record", size))
                        .bold()
                        .to_string(),
                );
            }

            let record = &records[entry.record];
            let text = match entry.disposition {
                Disposition::Keep => record.to_string(),
                Disposition::Delete => record.to_string().dimmed().to_string(),
            };
            lines.push(format!("   {} {}", entry.disposition.render(), text));
        }

        lines.push(String::new());
        lines.push(format!(
            "   {} {}, {} {} in groups, {} to delete",
            self.groups.len(),
            pluralize("group", self.groups.len()),
            self.total_in_groups(),
            pluralize("record", self.total_in_groups()),
            self.to_delete()
        ));

        lines.join("\n")
    }
}

impl PlanRender for BirthdayPlan {
    fn render(&self, events: &[Record]) -> String {
        let r = &self.reconciliation;
        let mut lines = vec![format!(
            "   {} {} in sync",
            r.matched.len(),
            pluralize("birthday", r.matched.len())
        )
        .dimmed()
        .to_string()];

        if !r.non_birthday.is_empty() {
            lines.push(String::new());
            lines.push("   Not birthdays (kept):".dimmed().to_string());
            for &i in &r.non_birthday {
                lines.push(format!("   {} {}", Disposition::Keep.render(), events[i]));
            }
        }

        if !r.orphans.is_empty() {
            lines.push(String::new());
            lines.push("   No matching contact (to delete):".dimmed().to_string());
            for &i in &r.orphans {
                lines.push(format!(
                    "   {} {}",
                    Disposition::Delete.render(),
                    events[i].to_string().dimmed()
                ));
            }
        }

        if !self.to_create.is_empty() {
            lines.push(String::new());
            lines.push("   Missing birthdays (to create):".dimmed().to_string());
            for event in &self.to_create {
                lines.push(format!(
                    "   {} {} {}",
                    "[CREATE]".blue(),
                    event.summary,
                    event.date.format("%d/%m").to_string().dimmed()
                ));
            }
        }

        if self.is_empty() {
            lines.push("   Birthday calendar is up to date".dimmed().to_string());
        }

        lines.join("\n")
    }
}

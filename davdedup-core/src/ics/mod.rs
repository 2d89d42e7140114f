//! iCalendar reading and writing.
//!
//! Events fetched from a calendar are parsed into [`crate::Record`]s; missing
//! birthdays are written out as yearly all-day VEVENTs.

mod generate;
mod parse;

pub use generate::{BirthdayEvent, birthday_event};
pub use parse::parse_event;

use crate::record::Record;

/// Parse every `(id, content)` pair, skipping (and logging) those that fail.
pub fn parse_all<'a, I>(calendar: Option<&str>, items: I) -> Vec<Record>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    items
        .into_iter()
        .filter_map(|(id, content)| match parse_event(id, calendar, content) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping event: {}", e);
                None
            }
        })
        .collect()
}

//! Store-neutral record types.
//!
//! Contacts and events are both turned into a [`Record`] by the parsers in
//! [`crate::vcard`] and [`crate::ics`]. The engine never mutates records:
//! clustering and selection work on indices into an immutable slice.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contact or calendar event after parsing and normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store identifier (href on a DAV server, or a synthetic id).
    pub id: String,
    /// Display name for contacts, SUMMARY for events. Trimmed, never case-folded.
    pub name: String,
    /// Normalized, de-duplicated email addresses.
    pub emails: Vec<String>,
    /// Normalized, de-duplicated phone numbers.
    pub phones: Vec<String>,
    /// Number of raw source lines, used as a richness proxy.
    pub raw_lines: usize,
    pub details: RecordDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordDetails {
    Contact(ContactDetails),
    Event(EventDetails),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDetails {
    /// Raw BDAY value, if any
    pub birthday: Option<String>,
    pub organization: Option<String>,
    pub has_address: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub description: Option<String>,
    pub start: Option<EventTime>,
    /// Number of properties on the VEVENT
    pub property_count: usize,
    /// Display name of the calendar the event was fetched from
    pub calendar: Option<String>,
}

/// Start time of an event, preserving the iCalendar form it was written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

impl EventTime {
    /// Calendar day as written, without timezone conversion.
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTimeUtc(dt) => dt.date_naive(),
            EventTime::DateTimeFloating(dt) => dt.date(),
            EventTime::DateTimeZoned { datetime, .. } => datetime.date(),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%d/%m/%Y")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%d/%m/%Y %H:%M UTC")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%d/%m/%Y %H:%M")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} {}", datetime.format("%d/%m/%Y %H:%M"), tzid)
            }
        }
    }
}

impl Record {
    pub fn is_event(&self) -> bool {
        matches!(self.details, RecordDetails::Event(_))
    }

    pub fn contact(&self) -> Option<&ContactDetails> {
        match &self.details {
            RecordDetails::Contact(c) => Some(c),
            RecordDetails::Event(_) => None,
        }
    }

    pub fn event(&self) -> Option<&EventDetails> {
        match &self.details {
            RecordDetails::Event(e) => Some(e),
            RecordDetails::Contact(_) => None,
        }
    }

    /// Start day of an event; `None` for contacts and events without DTSTART.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.event()?.start.as_ref().map(EventTime::date)
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = if self.name.is_empty() {
            if self.is_event() { "Sans titre" } else { "Sans nom" }
        } else {
            &self.name
        };

        match &self.details {
            RecordDetails::Contact(_) => write!(f, "{} ({})", name, self.emails.join(", ")),
            RecordDetails::Event(e) => {
                let date = e
                    .start
                    .as_ref()
                    .map(|s| s.date().format("%d/%m/%Y").to_string())
                    .unwrap_or_else(|| "Sans date".to_string());
                match &e.calendar {
                    Some(cal) => write!(f, "{} ({}) - {}", name, date, cal),
                    None => write!(f, "{} ({})", name, date),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Record builders shared by unit tests across the crate.

    use super::*;

    pub fn contact(id: &str, name: &str, emails: &[&str], phones: &[&str]) -> Record {
        Record {
            id: id.to_string(),
            name: name.to_string(),
            emails: emails.iter().map(|e| e.to_string()).collect(),
            phones: phones.iter().map(|p| p.to_string()).collect(),
            raw_lines: 5,
            details: RecordDetails::Contact(ContactDetails::default()),
        }
    }

    pub fn event(id: &str, title: &str, start: Option<NaiveDate>) -> Record {
        Record {
            id: id.to_string(),
            name: title.to_string(),
            emails: vec![],
            phones: vec![],
            raw_lines: 10,
            details: RecordDetails::Event(EventDetails {
                description: None,
                start: start.map(EventTime::Date),
                property_count: 4,
                calendar: None,
            }),
        }
    }

    pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_time_date_ignores_time_of_day() {
        let utc = EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2024, 5, 12, 23, 30, 0).unwrap());
        assert_eq!(utc.date(), ymd(2024, 5, 12));

        let zoned = EventTime::DateTimeZoned {
            datetime: ymd(2024, 5, 12).and_hms_opt(8, 0, 0).unwrap(),
            tzid: "Europe/Paris".to_string(),
        };
        assert_eq!(zoned.date(), ymd(2024, 5, 12));
    }

    #[test]
    fn test_display_falls_back_for_missing_fields() {
        let c = contact("1", "", &["a@example.com"], &[]);
        assert_eq!(c.to_string(), "Sans nom (a@example.com)");

        let e = event("2", "", None);
        assert_eq!(e.to_string(), "Sans titre (Sans date)");
    }
}

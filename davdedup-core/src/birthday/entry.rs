//! Birth dates extracted from contacts.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DedupError, DedupResult};
use crate::normalize::fold;
use crate::record::Record;

/// Name given to contacts that have a birth date but no name.
pub const UNNAMED_CONTACT: &str = "Contact sans nom";

/// A day of the year, written `MM-DD`. February 29th is a valid value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Option<Self> {
        // 2000 is a leap year, so 02-29 is accepted
        NaiveDate::from_ymd_opt(2000, month, day)?;
        Some(MonthDay { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// This day in `year`. February 29th falls back to the 28th in common years.
    pub fn in_year(&self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .or_else(|| NaiveDate::from_ymd_opt(year, self.month, self.day - 1))
            .unwrap_or_default()
    }
}

impl From<NaiveDate> for MonthDay {
    fn from(date: NaiveDate) -> Self {
        MonthDay {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = DedupError;

    fn from_str(s: &str) -> DedupResult<Self> {
        let invalid = || DedupError::parse(s, "expected a MM-DD day of the year");
        let (month, day) = s.trim().split_once('-').ok_or_else(invalid)?;
        let month = month.parse().map_err(|_| invalid())?;
        let day = day.parse().map_err(|_| invalid())?;
        MonthDay::new(month, day).ok_or_else(invalid)
    }
}

impl TryFrom<String> for MonthDay {
    type Error = DedupError;

    fn try_from(s: String) -> DedupResult<Self> {
        s.parse()
    }
}

impl From<MonthDay> for String {
    fn from(md: MonthDay) -> String {
        md.to_string()
    }
}

/// A contact's name and the day of the year they were born.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayEntry {
    pub name: String,
    pub date: MonthDay,
}

impl BirthdayEntry {
    pub fn new(name: impl Into<String>, date: MonthDay) -> Self {
        BirthdayEntry {
            name: name.into(),
            date,
        }
    }

    /// Entry for a contact with a readable BDAY, `None` otherwise.
    pub fn from_contact(record: &Record) -> Option<Self> {
        let raw = record.contact()?.birthday.as_deref()?;

        let Some(date) = parse_bday(raw) else {
            log::debug!("unreadable BDAY '{}' on {}", raw, record.id);
            return None;
        };

        let name = if record.has_name() {
            record.name.clone()
        } else {
            UNNAMED_CONTACT.to_string()
        };

        Some(BirthdayEntry { name, date })
    }

    /// Entries for every contact with a birth date, in input order.
    ///
    /// Contacts sharing a name (ignoring case) and a birth date
    /// yield a single entry, the first one.
    pub fn collect(records: &[Record]) -> Vec<Self> {
        let mut seen = HashSet::new();
        let entries: Vec<_> = records
            .iter()
            .filter_map(BirthdayEntry::from_contact)
            .filter(|entry| {
                let fresh = seen.insert(entry.key());
                if !fresh {
                    log::debug!("same birthday twice: {} ({})", entry.name, entry.date);
                }
                fresh
            })
            .collect();
        log::info!("{} contact(s) with a birth date", entries.len());
        entries
    }

    /// Identity of the birthday: folded name and day.
    pub(crate) fn key(&self) -> (String, MonthDay) {
        (fold(&self.name), self.date)
    }
}

/// Read a vCard BDAY value: `YYYY-MM-DD`, `YYYYMMDD`, `--MMDD` or `--MM-DD`,
/// optionally followed by a `T...` time part.
pub fn parse_bday(value: &str) -> Option<MonthDay> {
    let value = value.trim();
    let date = value.split('T').next().unwrap_or(value);

    if let Some(rest) = date.strip_prefix("--") {
        let digits: String = rest.chars().filter(|c| *c != '-').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        return MonthDay::new(digits[..2].parse().ok()?, digits[2..].parse().ok()?);
    }

    if date.contains('-') {
        let mut parts = date.split('-');
        let _year = parts.next()?;
        let month = parts.next()?.parse().ok()?;
        let day = parts.next()?.parse().ok()?;
        return MonthDay::new(month, day);
    }

    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        return MonthDay::new(date[4..6].parse().ok()?, date[6..8].parse().ok()?);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::contact;
    use crate::record::{ContactDetails, RecordDetails};

    fn with_bday(name: &str, bday: &str) -> Record {
        let mut r = contact("c", name, &[], &[]);
        r.details = RecordDetails::Contact(ContactDetails {
            birthday: Some(bday.to_string()),
            ..ContactDetails::default()
        });
        r
    }

    #[test]
    fn test_month_day_parse_and_display() {
        let md: MonthDay = "05-12".parse().unwrap();
        assert_eq!((md.month(), md.day()), (5, 12));
        assert_eq!(md.to_string(), "05-12");
        assert_eq!("5-1".parse::<MonthDay>().unwrap().to_string(), "05-01");
        assert!("13-01".parse::<MonthDay>().is_err());
        assert!("02-30".parse::<MonthDay>().is_err());
        assert!("0512".parse::<MonthDay>().is_err());
    }

    #[test]
    fn test_leap_day_in_common_year() {
        let md = MonthDay::new(2, 29).unwrap();
        assert_eq!(md.in_year(2024), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(md.in_year(2025), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn test_parse_bday_formats() {
        let expected = MonthDay::new(5, 12);
        assert_eq!(parse_bday("1980-05-12"), expected);
        assert_eq!(parse_bday("19800512"), expected);
        assert_eq!(parse_bday("--0512"), expected);
        assert_eq!(parse_bday("--05-12"), expected);
        assert_eq!(parse_bday("1980-05-12T00:00:00Z"), expected);
        assert_eq!(parse_bday("19800512T000000"), expected);
    }

    #[test]
    fn test_parse_bday_rejects_garbage() {
        assert_eq!(parse_bday(""), None);
        assert_eq!(parse_bday("1980"), None);
        assert_eq!(parse_bday("1980-13-01"), None);
        assert_eq!(parse_bday("--1301"), None);
        assert_eq!(parse_bday("unknown"), None);
    }

    #[test]
    fn test_entry_from_contact() {
        let entry = BirthdayEntry::from_contact(&with_bday("Jean Dupont", "1980-05-12")).unwrap();
        assert_eq!(entry.name, "Jean Dupont");
        assert_eq!(entry.date.to_string(), "05-12");

        let unnamed = BirthdayEntry::from_contact(&with_bday("", "--1107")).unwrap();
        assert_eq!(unnamed.name, UNNAMED_CONTACT);

        assert!(BirthdayEntry::from_contact(&with_bday("X", "bogus")).is_none());
        assert!(BirthdayEntry::from_contact(&contact("c", "No Bday", &[], &[])).is_none());
    }

    #[test]
    fn test_collect_keeps_one_entry_per_birthday() {
        let records = vec![
            with_bday("Jean Dupont", "1980-05-12"),
            with_bday("JEAN DUPONT", "--0512"),
            with_bday("Jean Dupont", "1985-09-01"),
        ];

        let entries = BirthdayEntry::collect(&records);
        assert_eq!(entries.len(), 2, "{:?}", entries);
        assert_eq!(entries[0].name, "Jean Dupont");
        assert_eq!(entries[0].date.to_string(), "05-12");
        assert_eq!(entries[1].date.to_string(), "09-01");
    }
}

//! Birthday event generation.

use chrono::{Duration, NaiveDate};
use icalendar::{Alarm, Calendar, Component, EventLike, Property, Trigger, ValueType};
use serde::Serialize;

use crate::birthday::BirthdayEntry;
use crate::error::{DedupError, DedupResult};

/// A synthesized birthday event, ready to be written to a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BirthdayEvent {
    pub uid: String,
    pub summary: String,
    /// First occurrence, in the year the event was generated for
    pub date: NaiveDate,
    /// Full VCALENDAR text
    pub ics: String,
}

impl BirthdayEvent {
    /// Resource name under the calendar collection.
    pub fn filename(&self) -> String {
        format!("{}.ics", self.uid)
    }
}

/// Yearly all-day event for `entry`, first occurring in `year`, with a display
/// alarm the day before.
pub fn birthday_event(entry: &BirthdayEntry, year: i32) -> DedupResult<BirthdayEvent> {
    let name = entry.name.trim();
    if name.is_empty() {
        return Err(DedupError::IcsGenerate(
            "birthday entry has no name".to_string(),
        ));
    }

    let uid = uuid::Uuid::new_v4().to_string();
    let summary = format!("Anniversaire de {}", name);
    let date = entry.date.in_year(year);

    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&uid);
    ics_event.summary(&summary);
    ics_event.add_property(
        "DTSTAMP",
        chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
    );

    add_date_property(&mut ics_event, "DTSTART", date);
    add_date_property(&mut ics_event, "DTEND", date + Duration::days(1));
    ics_event.add_property("RRULE", "FREQ=YEARLY");

    let mut alarm = Alarm::display(&summary, Trigger::before_start(Duration::days(1)));
    // Pin the trigger text; the crate may spell one day as hours
    alarm.add_property("TRIGGER", "-P1D");
    ics_event.alarm(alarm);

    let ics_event = ics_event.done();
    cal.push(ics_event);
    let cal = cal.done();

    let ics = strip_ics_bloat(&cal.to_string());

    Ok(BirthdayEvent {
        uid,
        summary,
        date,
        ics,
    })
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with our own
/// - Remove CALSCALE:GREGORIAN (it's the default)
/// - Remove DTSTAMP and UID inside VALARM sections (not required by RFC 5545)
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:-//davdedup//Birthdays//FR\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn add_date_property(ics_event: &mut icalendar::Event, name: &str, date: NaiveDate) {
    let mut prop = Property::new(name, date.format("%Y%m%d").to_string());
    prop.append_parameter(ValueType::Date);
    ics_event.append_property(prop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::birthday::MonthDay;

    fn jean() -> BirthdayEntry {
        BirthdayEntry::new("Jean Dupont", MonthDay::new(5, 12).unwrap())
    }

    fn section<'a>(ics: &'a str, component: &str) -> &'a str {
        ics.split(&format!("BEGIN:{}", component))
            .nth(1)
            .and_then(|rest| rest.split(&format!("END:{}", component)).next())
            .unwrap_or("")
    }

    #[test]
    fn test_birthday_event_lines() {
        let event = birthday_event(&jean(), 2024).unwrap();
        let lines: Vec<&str> = event.ics.lines().collect();

        for expected in [
            "BEGIN:VEVENT",
            "DTSTART;VALUE=DATE:20240512",
            "DTEND;VALUE=DATE:20240513",
            "SUMMARY:Anniversaire de Jean Dupont",
            "RRULE:FREQ=YEARLY",
            "ACTION:DISPLAY",
            "TRIGGER:-P1D",
            "END:VEVENT",
        ] {
            assert!(
                lines.contains(&expected),
                "missing line {:?} in:\n{}",
                expected,
                event.ics
            );
        }

        let uid_line = format!("UID:{}", event.uid);
        assert!(lines.contains(&uid_line.as_str()), "UID line missing:\n{}", event.ics);
        assert_eq!(event.summary, "Anniversaire de Jean Dupont");
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2024, 5, 12).unwrap());
    }

    #[test]
    fn test_alarm_is_minimal() {
        let event = birthday_event(&jean(), 2024).unwrap();
        let valarm = section(&event.ics, "VALARM");

        assert!(valarm.contains("TRIGGER:-P1D"), "VALARM:\n{}", valarm);
        assert!(!valarm.contains("UID:"), "VALARM should not have UID:\n{}", valarm);
        assert!(
            !valarm.contains("DTSTAMP:"),
            "VALARM should not have DTSTAMP:\n{}",
            valarm
        );
        assert!(!event.ics.contains("CALSCALE"), "{}", event.ics);
        assert!(event.ics.contains("PRODID:-//davdedup//Birthdays//FR"));
    }

    #[test]
    fn test_each_event_gets_a_fresh_uid() {
        let a = birthday_event(&jean(), 2024).unwrap();
        let b = birthday_event(&jean(), 2024).unwrap();
        assert_ne!(a.uid, b.uid);
        assert_eq!(a.filename(), format!("{}.ics", a.uid));
    }

    #[test]
    fn test_leap_day_birthday_in_common_year() {
        let entry = BirthdayEntry::new("Léa", MonthDay::new(2, 29).unwrap());
        let event = birthday_event(&entry, 2025).unwrap();
        assert!(event.ics.contains("DTSTART;VALUE=DATE:20250228"), "{}", event.ics);
        assert!(event.ics.contains("DTEND;VALUE=DATE:20250301"), "{}", event.ics);
    }

    #[test]
    fn test_generated_event_parses_back() {
        let event = birthday_event(&jean(), 2024).unwrap();
        let record = crate::ics::parse_event(&event.filename(), None, &event.ics).unwrap();
        assert_eq!(record.name, event.summary);
        assert_eq!(record.start_date(), Some(event.date));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let entry = BirthdayEntry::new("  ", MonthDay::new(1, 1).unwrap());
        assert!(matches!(
            birthday_event(&entry, 2024),
            Err(DedupError::IcsGenerate(_))
        ));
    }
}

//! Event parsing using the icalendar crate's parser.

use icalendar::{
    DatePerhapsTime,
    parser::{read_calendar, unfold},
};

use crate::error::{DedupError, DedupResult};
use crate::normalize;
use crate::record::{EventDetails, EventTime, Record, RecordDetails};

/// Parse the first VEVENT of an iCalendar object into a [`Record`].
///
/// `id` is the store identifier (href) and `calendar` the display name of the
/// calendar the object came from. A missing or invalid DTSTART is not an
/// error: the record simply has no start date.
pub fn parse_event(id: &str, calendar: Option<&str>, content: &str) -> DedupResult<Record> {
    let unfolded = unfold(content);
    let parsed = read_calendar(&unfolded).map_err(|e| DedupError::parse(id, e.to_string()))?;
    let vevent = parsed
        .components
        .iter()
        .find(|c| c.name == "VEVENT")
        .ok_or_else(|| DedupError::parse(id, "no VEVENT component"))?;

    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| normalize::name(p.val.as_ref()))
        .unwrap_or_default();

    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| p.val.to_string())
        .filter(|d| !d.trim().is_empty());

    let start = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time);

    Ok(Record {
        id: id.to_string(),
        name: summary,
        emails: vec![],
        phones: vec![],
        raw_lines: content.lines().count(),
        details: RecordDetails::Event(EventDetails {
            description,
            start,
            property_count: vevent.properties.len(),
            calendar: calendar.map(str::to_string),
        }),
    })
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

//! vCard parsing into [`Record`]s.
//!
//! Only the handful of properties the engine compares are read. Content
//! lines are unfolded (RFC 6350 §3.2), group prefixes such as `item1.` are
//! dropped and parameters are ignored.

use crate::error::{DedupError, DedupResult};
use crate::normalize;
use crate::record::{ContactDetails, Record, RecordDetails};

/// A single `NAME;PARAMS:VALUE` content line.
#[derive(Debug, PartialEq)]
struct ContentLine<'a> {
    name: String,
    value: &'a str,
}

/// Parse one vCard into a contact [`Record`].
pub fn parse_contact(id: &str, content: &str) -> DedupResult<Record> {
    let unfolded = unfold(content);
    let lines: Vec<ContentLine<'_>> = unfolded.lines().filter_map(content_line).collect();

    let begins = lines
        .iter()
        .any(|l| l.name == "BEGIN" && l.value.eq_ignore_ascii_case("VCARD"));
    let ends = lines
        .iter()
        .any(|l| l.name == "END" && l.value.eq_ignore_ascii_case("VCARD"));
    if !begins || !ends {
        return Err(DedupError::parse(id, "missing BEGIN:VCARD/END:VCARD"));
    }

    let name = first(&lines, "FN")
        .or_else(|| values(&lines, "N").find_map(structured_name))
        .map(|n| normalize::name(&n))
        .unwrap_or_default();

    let emails = normalize::collect_unique(values(&lines, "EMAIL"), normalize::email);
    let phones = normalize::collect_unique(values(&lines, "TEL"), normalize::phone);

    let organization = first(&lines, "ORG").map(|org| org.replace(';', " ").trim().to_string());
    let has_address = values(&lines, "ADR")
        .any(|adr| adr.chars().any(|c| c != ';' && !c.is_whitespace()));

    Ok(Record {
        id: id.to_string(),
        name,
        emails,
        phones,
        raw_lines: content.lines().count(),
        details: RecordDetails::Contact(ContactDetails {
            birthday: first(&lines, "BDAY").map(|b| b.trim().to_string()),
            organization,
            has_address,
        }),
    })
}

/// Parse every `(id, content)` pair, skipping (and logging) those that fail.
pub fn parse_all<'a, I>(items: I) -> Vec<Record>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    items
        .into_iter()
        .filter_map(|(id, content)| match parse_contact(id, content) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping contact: {}", e);
                None
            }
        })
        .collect()
}

fn values<'a>(lines: &[ContentLine<'a>], name: &str) -> impl Iterator<Item = &'a str> {
    lines.iter().filter(move |l| l.name == name).map(|l| l.value)
}

/// First non-blank value of a property, unescaped.
fn first(lines: &[ContentLine<'_>], name: &str) -> Option<String> {
    values(lines, name)
        .map(unescape)
        .find(|v| !v.trim().is_empty())
}

/// Join continuation lines (starting with a space or tab) onto the previous line.
fn unfold(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix([' ', '\t']) {
            out.push_str(rest);
        } else {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
    }
    out
}

fn content_line(line: &str) -> Option<ContentLine<'_>> {
    let (head, value) = line.split_once(':')?;
    let name = head.split(';').next().unwrap_or(head);
    let name = name.rsplit('.').next().unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(ContentLine {
        name: name.trim().to_ascii_uppercase(),
        value,
    })
}

/// `Family;Given;Additional;Prefix;Suffix` as "Given Family".
fn structured_name(value: &str) -> Option<String> {
    let mut parts = value.split(';').map(unescape);
    let family = parts.next().unwrap_or_default();
    let given = parts.next().unwrap_or_default();
    let joined = format!("{} {}", given.trim(), family.trim()).trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const JEAN: &str = "BEGIN:VCARD\r\n\
VERSION:3.0\r\n\
FN:Jean Dupont\r\n\
N:Dupont;Jean;;;\r\n\
EMAIL;TYPE=HOME:Jean.Dupont@Example.ORG\r\n\
item1.EMAIL:jean.dupont@example.org\r\n\
TEL;TYPE=CELL:+33 6 12 34 56 78\r\n\
TEL:06.12.34.56.78\r\n\
BDAY:1980-05-12\r\n\
ORG:ACME;R&D\r\n\
ADR;TYPE=HOME:;;1 rue de la Paix;Paris;;75002;France\r\n\
END:VCARD\r\n";

    #[test]
    fn test_parse_contact_fields() {
        let record = parse_contact("/ab/jean.vcf", JEAN).unwrap();

        assert_eq!(record.id, "/ab/jean.vcf");
        assert_eq!(record.name, "Jean Dupont");
        assert_eq!(record.emails, vec!["jean.dupont@example.org"]);
        assert_eq!(record.phones, vec!["+33612345678", "0612345678"]);
        assert_eq!(record.raw_lines, 12);

        let details = record.contact().unwrap();
        assert_eq!(details.birthday.as_deref(), Some("1980-05-12"));
        assert_eq!(details.organization.as_deref(), Some("ACME R&D"));
        assert!(details.has_address);
    }

    #[test]
    fn test_name_falls_back_to_structured_name() {
        let vcf = "BEGIN:VCARD\nVERSION:3.0\nN:Curie;Marie;;;\nEND:VCARD\n";
        let record = parse_contact("m", vcf).unwrap();
        assert_eq!(record.name, "Marie Curie");
    }

    #[test]
    fn test_folded_and_escaped_values() {
        let vcf = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Dupont\\, Jean-\r\n Pierre\r\nEND:VCARD\r\n";
        let record = parse_contact("f", vcf).unwrap();
        assert_eq!(record.name, "Dupont, Jean-Pierre");
    }

    #[test]
    fn test_contact_without_name_or_address() {
        let vcf = "BEGIN:VCARD\nVERSION:3.0\nEMAIL:a@x.org\nADR:;;;;;;\nEND:VCARD\n";
        let record = parse_contact("n", vcf).unwrap();
        assert!(!record.has_name());
        assert!(!record.contact().unwrap().has_address);
    }

    #[test]
    fn test_text_without_vcard_envelope_is_a_parse_error() {
        let err = parse_contact("bad", "FN:Nobody\n").unwrap_err();
        assert!(matches!(err, DedupError::Parse { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_parse_all_skips_failures() {
        let records = parse_all([("ok", JEAN), ("bad", "garbage"), ("ok2", JEAN)]);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "ok2"]);
    }
}

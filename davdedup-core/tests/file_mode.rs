//! Exact deduplication of exported address books.

use std::fs;

use davdedup_core::vcf;

const JEAN: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jean Dupont\r\n\
                    EMAIL:jean@example.org\r\nEND:VCARD\r\n";
const JEAN_TYPO: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jean Dupont\r\n\
                         EMAIL:jean@example.com\r\nEND:VCARD\r\n";

#[test]
fn exported_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("contacts.vcf");
    let output = dir.path().join("contacts.dedup.vcf");

    fs::write(&input, format!("{}{}{}{}", JEAN, JEAN, JEAN_TYPO, JEAN)).unwrap();

    let content = fs::read_to_string(&input).unwrap();
    let (deduped, removed) = vcf::dedupe_exact(&content);
    fs::write(&output, &deduped).unwrap();

    assert_eq!(removed, 2);
    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written, format!("{}{}", JEAN, JEAN_TYPO));
    assert_eq!(vcf::split_cards(&written).len(), 2);

    // A second pass has nothing left to do
    assert_eq!(vcf::dedupe_exact(&written).1, 0);
}

#[test]
fn near_duplicates_are_not_touched() {
    let content = format!("{}{}", JEAN, JEAN_TYPO);
    let (deduped, removed) = vcf::dedupe_exact(&content);
    assert_eq!(removed, 0);
    assert_eq!(deduped, content);
}

#[test]
fn unix_line_endings() {
    let card = "BEGIN:VCARD\nFN:A\nEND:VCARD\n";
    let (deduped, removed) = vcf::dedupe_exact(&format!("{}\n{}", card, card));
    assert_eq!(removed, 1);
    assert_eq!(deduped, format!("{}\n", card));
}

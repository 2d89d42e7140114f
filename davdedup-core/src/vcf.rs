//! Exact deduplication of `.vcf` files.
//!
//! Works on raw text: a card is removed only when an earlier card in the same
//! file is byte-for-byte identical. Everything between cards is preserved.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

// A card and the line breaks that follow it
static VCARD_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)(^BEGIN:VCARD.*?^END:VCARD)([\r\n]*)").expect("Invalid regex")
});

/// Drop repeated cards, keeping the first occurrence of each.
///
/// Returns the rewritten content and the number of cards removed.
pub fn dedupe_exact(content: &str) -> (String, usize) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = String::with_capacity(content.len());
    let mut removed = 0;
    let mut position = 0;

    for caps in VCARD_BLOCK.captures_iter(content) {
        let (Some(card), Some(whole)) = (caps.get(1), caps.get(0)) else {
            continue;
        };

        out.push_str(&content[position..card.start()]);

        if seen.insert(card.as_str()) {
            out.push_str(whole.as_str());
        } else {
            removed += 1;
            log::debug!("duplicate card #{} removed", removed);
        }

        position = whole.end();
    }

    out.push_str(&content[position..]);

    log::info!("{} duplicate card(s) removed", removed);
    (out, removed)
}

/// Raw text of every card in `content`, in order.
pub fn split_cards(content: &str) -> Vec<&str> {
    VCARD_BLOCK
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JEAN: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jean Dupont\r\nEND:VCARD\r\n";
    const JEAN_TYPO: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jean Dupond\r\nEND:VCARD\r\n";

    #[test]
    fn test_identical_cards_keep_one_copy() {
        let input = format!("{}{}{}", JEAN, JEAN, JEAN);
        let (output, removed) = dedupe_exact(&input);
        assert_eq!(output, JEAN);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_single_character_difference_keeps_both() {
        let input = format!("{}{}", JEAN, JEAN_TYPO);
        let (output, removed) = dedupe_exact(&input);
        assert_eq!(output, input);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_text_between_cards_is_preserved() {
        let input = format!("header\r\n{}garbage line\r\n{}trailer", JEAN, JEAN);
        let (output, removed) = dedupe_exact(&input);
        assert_eq!(removed, 1);
        assert_eq!(output, format!("header\r\n{}garbage line\r\ntrailer", JEAN));
    }

    #[test]
    fn test_non_adjacent_duplicates_are_removed() {
        let input = format!("{}{}{}", JEAN, JEAN_TYPO, JEAN);
        let (output, removed) = dedupe_exact(&input);
        assert_eq!(removed, 1);
        assert_eq!(output, format!("{}{}", JEAN, JEAN_TYPO));
    }

    #[test]
    fn test_empty_and_cardless_input() {
        assert_eq!(dedupe_exact(""), (String::new(), 0));
        assert_eq!(dedupe_exact("no cards here\n"), ("no cards here\n".to_string(), 0));
    }

    #[test]
    fn test_split_cards() {
        let input = format!("{}\r\n\r\n{}", JEAN, JEAN_TYPO);
        let cards = split_cards(&input);
        assert_eq!(cards.len(), 2);
        assert!(cards[0].ends_with("END:VCARD"));
        assert!(cards[1].contains("Dupond"));
    }
}

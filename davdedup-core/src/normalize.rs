//! Canonical forms for comparable record fields.
//!
//! All functions are pure and total: missing or garbage input yields an empty
//! string, never an error.

use unicode_normalization::UnicodeNormalization;

/// Lower-cased, trimmed email address.
pub fn email(raw: &str) -> String {
    raw.trim().nfc().collect::<String>().to_lowercase()
}

/// Digits only, keeping a `+` when it is the first significant character.
pub fn phone(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if c == '+' && out.is_empty() {
            out.push(c);
        }
    }
    if out == "+" { String::new() } else { out }
}

/// Trimmed display name in NFC. Case is preserved; see [`fold`].
pub fn name(raw: &str) -> String {
    raw.trim().nfc().collect()
}

/// Comparison key for names and titles: NFC plus lower-case.
pub fn fold(value: &str) -> String {
    value.trim().nfc().collect::<String>().to_lowercase()
}

/// Folded value with punctuation removed, used for name similarity in the
/// birthday reconciler ("Jean-Dupont!" and "jean dupont" compare closely).
pub fn fold_alphanumeric(value: &str) -> String {
    fold(value)
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalize every value with `f`, dropping empties and repeats (first wins).
pub fn collect_unique<'a, I, F>(values: I, f: F) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> String,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let normalized = f(value);
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_trimmed_and_lowercased() {
        assert_eq!(email("  Jean.Dupont@Example.COM "), "jean.dupont@example.com");
        assert_eq!(email(""), "");
    }

    #[test]
    fn test_phone_keeps_digits_and_leading_plus() {
        assert_eq!(phone("+33 (0)6 12-34-56-78"), "+330612345678");
        assert_eq!(phone("06.12.34.56.78"), "0612345678");
        // A plus after digits is not a country prefix
        assert_eq!(phone("0612+34"), "061234");
        assert_eq!(phone("+"), "");
        assert_eq!(phone("n/a"), "");
    }

    #[test]
    fn test_name_preserves_case() {
        assert_eq!(name("  Jean Dupont "), "Jean Dupont");
    }

    #[test]
    fn test_fold_unifies_composed_and_decomposed_accents() {
        let composed = "Ren\u{e9}e";
        let decomposed = "Rene\u{301}e";
        assert_eq!(fold(composed), fold(decomposed));
        assert_eq!(fold("RENÉE"), "renée");
    }

    #[test]
    fn test_fold_alphanumeric_strips_punctuation() {
        assert_eq!(fold_alphanumeric("Jean-Dupont !"), "jeandupont");
        assert_eq!(fold_alphanumeric(" Marie  Curie "), "marie  curie");
    }

    #[test]
    fn test_collect_unique_drops_empties_and_repeats() {
        let emails = collect_unique(["A@x.org", "a@x.org ", "", "b@x.org"], email);
        assert_eq!(emails, vec!["a@x.org".to_string(), "b@x.org".to_string()]);
    }
}

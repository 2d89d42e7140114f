//! Electing the record each duplicate group keeps.

use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordDetails};

/// Per-signal weights for contact scoring.
///
/// The defaults give `2×emails + 2×phones + 5×has_name + raw_lines`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionWeights {
    pub email_count: u32,
    pub phone_count: u32,
    pub has_full_name: u32,
    pub vcard_richness: u32,
    pub has_organization: u32,
    pub has_address: u32,
    pub has_birthday: u32,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        SelectionWeights {
            email_count: 2,
            phone_count: 2,
            has_full_name: 5,
            vcard_richness: 1,
            has_organization: 0,
            has_address: 0,
            has_birthday: 0,
        }
    }
}

/// A set of records believed to be the same entity, plus the one to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Indices into the record slice, in input order
    pub members: Vec<usize>,
    /// Always one of `members`
    pub survivor: usize,
}

impl DuplicateGroup {
    /// Score every member and keep the best one. `None` when `members` is
    /// empty.
    pub fn elect(
        records: &[Record],
        members: Vec<usize>,
        weights: &SelectionWeights,
    ) -> Option<Self> {
        let survivor = select(records, &members, weights)?;
        Some(DuplicateGroup { members, survivor })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members to delete, in input order.
    pub fn losers(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().copied().filter(move |&i| i != self.survivor)
    }
}

/// Richness score of a single record.
pub fn score(record: &Record, weights: &SelectionWeights) -> f64 {
    match &record.details {
        RecordDetails::Contact(contact) => {
            let mut score = weights.email_count as usize * record.emails.len()
                + weights.phone_count as usize * record.phones.len()
                + weights.vcard_richness as usize * record.raw_lines;

            if record.has_name() {
                score += weights.has_full_name as usize;
            }
            if contact.organization.is_some() {
                score += weights.has_organization as usize;
            }
            if contact.has_address {
                score += weights.has_address as usize;
            }
            if contact.birthday.is_some() {
                score += weights.has_birthday as usize;
            }

            score as f64
        }
        RecordDetails::Event(event) => {
            let description = event
                .description
                .as_deref()
                .map(|d| d.chars().count())
                .unwrap_or(0);

            0.1 * description as f64
                + 0.2 * record.name.chars().count() as f64
                + 0.5 * record.raw_lines as f64
                + 0.3 * event.property_count as f64
        }
    }
}

/// Index of the highest-scoring member; the earliest wins ties.
pub fn select(records: &[Record], members: &[usize], weights: &SelectionWeights) -> Option<usize> {
    let (&first, rest) = members.split_first()?;
    let mut best = first;
    let mut best_score = score(&records[best], weights);

    for &candidate in rest {
        let candidate_score = score(&records[candidate], weights);
        if candidate_score > best_score {
            best = candidate;
            best_score = candidate_score;
        }
    }

    log::debug!("kept {} (score {:.1})", records[best], best_score);
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{contact, event, ymd};
    use crate::record::{ContactDetails, EventDetails};

    #[test]
    fn test_contact_score_formula() {
        let mut c = contact("1", "Jean", &["a@x.org", "b@x.org"], &["0612"]);
        c.raw_lines = 10;
        // 2*2 + 2*1 + 5 + 10
        assert_eq!(score(&c, &SelectionWeights::default()), 21.0);

        c.name.clear();
        assert_eq!(score(&c, &SelectionWeights::default()), 16.0);
    }

    #[test]
    fn test_supplementary_weights_default_to_zero() {
        let mut c = contact("1", "Jean", &[], &[]);
        c.details = RecordDetails::Contact(ContactDetails {
            birthday: Some("19800512".to_string()),
            organization: Some("ACME".to_string()),
            has_address: true,
        });
        let plain = contact("2", "Jean", &[], &[]);
        assert_eq!(
            score(&c, &SelectionWeights::default()),
            score(&plain, &SelectionWeights::default())
        );

        let weights = SelectionWeights {
            has_organization: 3,
            has_address: 3,
            has_birthday: 2,
            ..SelectionWeights::default()
        };
        assert_eq!(score(&c, &weights), score(&plain, &weights) + 8.0);
    }

    #[test]
    fn test_event_score_formula() {
        let mut e = event("1", "Dentiste", Some(ymd(2024, 1, 1)));
        e.raw_lines = 10;
        e.details = RecordDetails::Event(EventDetails {
            description: Some("x".repeat(20)),
            start: None,
            property_count: 10,
            calendar: None,
        });
        // 0.1*20 + 0.2*8 + 0.5*10 + 0.3*10
        let s = score(&e, &SelectionWeights::default());
        assert!((s - 11.6).abs() < 1e-9, "got {}", s);
    }

    #[test]
    fn test_richest_contact_survives() {
        let records = vec![
            contact("0", "Jean", &["a@x.org"], &[]),
            contact("1", "Jean", &["a@x.org", "b@x.org"], &["0612"]),
            contact("2", "", &["a@x.org"], &[]),
        ];
        let group =
            DuplicateGroup::elect(&records, vec![0, 1, 2], &SelectionWeights::default()).unwrap();
        assert_eq!(group.survivor, 1);
        assert_eq!(group.losers().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_ties_keep_first_occurrence() {
        let records = vec![
            contact("0", "Jean", &["a@x.org"], &[]),
            contact("1", "Jean", &["a@x.org"], &[]),
        ];
        assert_eq!(select(&records, &[0, 1], &SelectionWeights::default()), Some(0));
        assert_eq!(select(&records, &[1, 0], &SelectionWeights::default()), Some(1));
    }

    #[test]
    fn test_single_member_elects_itself() {
        let records = vec![contact("0", "Jean", &[], &[])];
        let group = DuplicateGroup::elect(&records, vec![0], &SelectionWeights::default()).unwrap();
        assert_eq!(group.survivor, 0);
        assert_eq!(group.losers().count(), 0);
    }

    #[test]
    fn test_empty_group_elects_nobody() {
        let records = vec![contact("0", "Jean", &[], &[])];
        assert_eq!(select(&records, &[], &SelectionWeights::default()), None);
        assert!(DuplicateGroup::elect(&records, vec![], &SelectionWeights::default()).is_none());
    }
}

//! Partitioning records into duplicate groups.
//!
//! Clusters are lists of indices into the input slice, in input order.
//! Records that match nothing are left out (they are implicit singletons,
//! see [`ungrouped`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::normalize::fold;
use crate::record::Record;
use crate::similarity::{MatchRules, MatchStrategy, Matcher};

/// How matches are chained into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterPolicy {
    /// Every member is checked against the group's anchor only.
    /// If B matches anchor A and C matches B but not A, C is not in A's group.
    #[default]
    Star,
    /// Connected components of the "is duplicate" relation.
    Transitive,
}

/// Group `records` into clusters of two or more duplicates.
///
/// Under the exact strategy, contacts are bucketed by identical email first
/// and then by identical folded name; the policy does not apply there.
pub fn cluster(records: &[Record], matcher: &Matcher, policy: ClusterPolicy) -> Vec<Vec<usize>> {
    let clusters = if matcher.strategy() == MatchStrategy::Exact
        && !records.is_empty()
        && records.iter().all(|r| !r.is_event())
    {
        by_exact_keys(records, matcher.rules())
    } else {
        match policy {
            ClusterPolicy::Star => star(records, matcher),
            ClusterPolicy::Transitive => transitive(records, matcher),
        }
    };

    log::debug!(
        "{} records -> {} duplicate groups ({} strategy, {:?} policy)",
        records.len(),
        clusters.len(),
        matcher.strategy(),
        policy
    );

    clusters
}

/// Indices that belong to no cluster.
pub fn ungrouped(len: usize, clusters: &[Vec<usize>]) -> Vec<usize> {
    let mut assigned = vec![false; len];
    for idx in clusters.iter().flatten() {
        assigned[*idx] = true;
    }
    (0..len).filter(|i| !assigned[*i]).collect()
}

fn star(records: &[Record], matcher: &Matcher) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; records.len()];
    let mut clusters = Vec::new();

    for anchor in 0..records.len() {
        if assigned[anchor] {
            continue;
        }
        assigned[anchor] = true;

        let mut members = vec![anchor];
        for candidate in (anchor + 1)..records.len() {
            if assigned[candidate] {
                continue;
            }
            if matcher.is_duplicate(&records[anchor], &records[candidate]) {
                members.push(candidate);
                assigned[candidate] = true;
            }
        }

        if members.len() > 1 {
            clusters.push(members);
        }
    }

    clusters
}

fn transitive(records: &[Record], matcher: &Matcher) -> Vec<Vec<usize>> {
    let mut sets = DisjointSets::new(records.len());

    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            if matcher.is_duplicate(&records[i], &records[j]) {
                sets.union(i, j);
            }
        }
    }

    // Order clusters by their first member so output follows input order
    let mut by_root: HashMap<usize, usize> = HashMap::new();
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for i in 0..records.len() {
        let root = sets.find(i);
        match by_root.get(&root) {
            Some(&slot) => clusters[slot].push(i),
            None => {
                by_root.insert(root, clusters.len());
                clusters.push(vec![i]);
            }
        }
    }

    clusters.retain(|c| c.len() > 1);
    clusters
}

/// Degraded contact grouping: identical email, then identical folded name
/// for records not already grouped.
fn by_exact_keys(records: &[Record], rules: MatchRules) -> Vec<Vec<usize>> {
    let mut email_buckets = Buckets::default();
    let mut name_buckets = Buckets::default();

    for (i, record) in records.iter().enumerate() {
        if rules.by_email {
            for email in &record.emails {
                email_buckets.add(email.clone(), i);
            }
        }
        if rules.by_name_similarity && record.has_name() {
            name_buckets.add(fold(&record.name), i);
        }
    }

    let mut grouped = vec![false; records.len()];
    let mut clusters = Vec::new();

    for bucket in email_buckets.into_ordered().into_iter().chain(name_buckets.into_ordered()) {
        let members: Vec<usize> = bucket.into_iter().filter(|i| !grouped[*i]).collect();
        if members.len() > 1 {
            for i in &members {
                grouped[*i] = true;
            }
            clusters.push(members);
        }
    }

    clusters
}

/// Key -> indices, iterated in order of first appearance.
#[derive(Default)]
struct Buckets {
    slots: HashMap<String, usize>,
    buckets: Vec<Vec<usize>>,
}

impl Buckets {
    fn add(&mut self, key: String, index: usize) {
        let next = self.buckets.len();
        let slot = *self.slots.entry(key).or_insert(next);
        if slot == next {
            self.buckets.push(Vec::new());
        }
        let bucket = &mut self.buckets[slot];
        if !bucket.contains(&index) {
            bucket.push(index);
        }
    }

    fn into_ordered(self) -> Vec<Vec<usize>> {
        self.buckets
    }
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        DisjointSets {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower index becomes the root
            let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[merge] = keep;
        }
    }
}

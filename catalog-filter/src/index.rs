use crate::model::AttributeValue;
use crate::snapshot::CatalogSnapshot;
use serde::Serialize;
use std::collections::HashMap;

/// Inverted index from attribute value to the positions of the entries that
/// carry it.
///
/// Posting lists are ascending and duplicate-free. An index only describes the
/// snapshot it was built from; a new snapshot always gets a fresh index.
#[derive(Clone, Debug, Default)]
pub struct AttributeIndex {
    sequence: u64,
    entry_count: usize,
    postings: HashMap<AttributeValue, Vec<usize>>,
}

/// How many entries of the snapshot carry one attribute value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Facet {
    pub value: AttributeValue,
    pub count: usize,
}

impl AttributeIndex {
    /// Single pass over every attribute occurrence of `snapshot`.
    pub fn build(snapshot: &CatalogSnapshot) -> Self {
        let mut postings: HashMap<AttributeValue, Vec<usize>> = HashMap::new();
        for (position, entry) in snapshot.entries().iter().enumerate() {
            for value in &entry.attributes {
                postings.entry(value.clone()).or_default().push(position);
            }
        }
        Self {
            sequence: snapshot.sequence(),
            entry_count: snapshot.len(),
            postings,
        }
    }

    /// Positions carrying `value`, ascending. Unknown values yield an empty slice.
    pub fn positions(&self, value: &AttributeValue) -> &[usize] {
        self.postings
            .get(value)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Sequence number of the snapshot this index was built from.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn value_count(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Every indexed value with its entry count, ordered by value.
    pub fn facets(&self) -> Vec<Facet> {
        let mut facets: Vec<Facet> = self
            .postings
            .iter()
            .map(|(value, positions)| Facet {
                value: value.clone(),
                count: positions.len(),
            })
            .collect();
        facets.sort();
        facets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawEntry;
    use crate::model::validate_entries;
    use pretty_assertions::assert_eq;

    fn snapshot(entries: &[(&str, &[&str])]) -> CatalogSnapshot {
        let raw = entries
            .iter()
            .map(|(id, sizes)| RawEntry::new(*id, "item", 1.0).with_sizes(sizes.iter().copied()))
            .collect();
        CatalogSnapshot::new(3, validate_entries(raw).entries)
    }

    #[test]
    fn postings_are_ascending_positions() {
        let snapshot = snapshot(&[("1", &["S", "M"]), ("2", &["M", "L"]), ("3", &["S", "L"])]);
        let index = AttributeIndex::build(&snapshot);

        assert_eq!(index.sequence(), 3);
        assert_eq!(index.entry_count(), 3);
        assert_eq!(index.positions(&"S".into()), &[0, 2]);
        assert_eq!(index.positions(&"M".into()), &[0, 1]);
        assert_eq!(index.positions(&"L".into()), &[1, 2]);
        assert!(index.positions(&"XL".into()).is_empty());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let snapshot = snapshot(&[("1", &["M", "S"]), ("2", &["L"]), ("3", &[])]);
        let first = AttributeIndex::build(&snapshot);
        let second = AttributeIndex::build(&snapshot);

        assert_eq!(first.facets(), second.facets());
        for facet in first.facets() {
            assert_eq!(first.positions(&facet.value), second.positions(&facet.value));
        }
    }

    #[test]
    fn facets_count_entries_per_value() {
        let snapshot = snapshot(&[("1", &["S", "M"]), ("2", &["M"]), ("3", &[])]);
        let index = AttributeIndex::build(&snapshot);

        assert_eq!(
            index.facets(),
            vec![
                Facet {
                    value: "M".into(),
                    count: 2
                },
                Facet {
                    value: "S".into(),
                    count: 1
                },
            ]
        );
        assert_eq!(index.value_count(), 2);
    }
}

//! # Duplicate Grouper
//!
//! Buckets records by normalized title in a single pass, keeping first-seen
//! order both within a group and across groups.

use std::collections::HashMap;

use crate::error::{FabulaError, Result};
use crate::normalize::TitleNormalizer;
use crate::types::{NormalizedKey, RawRecord};

/// Records sharing one normalized title, in input order. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    key: NormalizedKey,
    records: Vec<RawRecord>,
}

impl DuplicateGroup {
    /// Starts a group with its first member.
    #[must_use]
    pub fn new(key: NormalizedKey, first: RawRecord) -> Self {
        Self {
            key,
            records: vec![first],
        }
    }

    /// Builds a group from an existing sequence.
    ///
    /// # Errors
    ///
    /// Returns `FabulaError::EmptyGroupInvariantViolation` if `records` is empty.
    pub fn from_records(key: NormalizedKey, records: Vec<RawRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(FabulaError::EmptyGroupInvariantViolation {
                key: key.to_string(),
            });
        }
        Ok(Self { key, records })
    }

    pub fn push(&mut self, record: RawRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn key(&self) -> &NormalizedKey {
        &self.key
    }

    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.records.len() == 1
    }
}

/// Ordered mapping from normalized key to its duplicate group.
#[derive(Debug, Clone, Default)]
pub struct GroupedRecords {
    groups: Vec<DuplicateGroup>,
    index: HashMap<NormalizedKey, usize>,
}

impl GroupedRecords {
    /// Groups in first-seen order.
    #[must_use]
    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    #[must_use]
    pub fn get(&self, key: &NormalizedKey) -> Option<&DuplicateGroup> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total records across all groups.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }

    /// Groups with more than one member.
    pub fn duplicates(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(|g| !g.is_singleton())
    }

    fn insert(&mut self, key: NormalizedKey, record: RawRecord) {
        match self.index.get(&key) {
            Some(&i) => self.groups[i].push(record),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push(DuplicateGroup::new(key, record));
            }
        }
    }
}

impl IntoIterator for GroupedRecords {
    type Item = DuplicateGroup;
    type IntoIter = std::vec::IntoIter<DuplicateGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Partitions records by normalized title.
#[derive(Debug, Clone)]
pub struct DuplicateGrouper {
    normalizer: TitleNormalizer,
}

impl DuplicateGrouper {
    #[must_use]
    pub fn new(normalizer: TitleNormalizer) -> Self {
        Self { normalizer }
    }

    #[must_use]
    pub fn normalizer(&self) -> &TitleNormalizer {
        &self.normalizer
    }

    /// Groups `records` by the normalized form of their `title`.
    /// One normalizer call per record.
    pub fn group<I>(&self, records: I) -> GroupedRecords
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut grouped = GroupedRecords::default();
        for record in records {
            let key = self.normalizer.normalize(&record.title);
            grouped.insert(key, record);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouper() -> DuplicateGrouper {
        DuplicateGrouper::new(TitleNormalizer::new().unwrap())
    }

    fn rec(title: &str, url: &str) -> RawRecord {
        RawRecord::new(title, url, "some words here")
    }

    #[test]
    fn groups_by_normalized_title_in_first_seen_order() {
        let grouped = grouper().group(vec![
            rec("The Fox and the Grapes", "u1"),
            rec("The Lion and the Mouse", "u2"),
            rec("Fox and the Grapes Fable", "u3"),
            rec("The Ant and the Grasshopper", "u4"),
            rec("fox and the grapes!", "u5"),
        ]);

        let keys: Vec<_> = grouped.groups().iter().map(|g| g.key().as_str()).collect();
        assert_eq!(
            keys,
            ["fox and the grapes", "lion and the mouse", "ant and the grasshopper"]
        );

        let fox = &grouped.groups()[0];
        let urls: Vec<_> = fox.records().iter().map(|r| r.source_url.as_str()).collect();
        assert_eq!(urls, ["u1", "u3", "u5"]);
        assert_eq!(grouped.duplicates().count(), 1);
    }

    #[test]
    fn grouping_is_a_partition() {
        let input: Vec<_> = (0..40)
            .map(|i| rec(&format!("The Title {}", i % 7), &format!("u{i}")))
            .collect();
        let grouped = grouper().group(input.clone());

        assert_eq!(grouped.record_count(), input.len());
        let mut seen: Vec<&str> = grouped
            .groups()
            .iter()
            .flat_map(|g| g.records().iter().map(|r| r.source_url.as_str()))
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = input.iter().map(|r| r.source_url.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);

        let normalizer = TitleNormalizer::new().unwrap();
        for group in grouped.groups() {
            assert!(!group.is_empty());
            for r in group.records() {
                assert_eq!(&normalizer.normalize(&r.title), group.key());
            }
        }
    }

    #[test]
    fn lookup_by_key() {
        let grouped = grouper().group(vec![rec("The Miser", "a"), rec("A Miser", "b")]);
        let key = TitleNormalizer::new().unwrap().normalize("miser");
        assert_eq!(grouped.get(&key).map(DuplicateGroup::len), Some(2));
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let grouped = grouper().group(Vec::new());
        assert!(grouped.is_empty());
        assert_eq!(grouped.record_count(), 0);
    }

    #[test]
    fn empty_group_construction_is_rejected() {
        let key = TitleNormalizer::new().unwrap().normalize("ghost");
        assert!(matches!(
            DuplicateGroup::from_records(key, Vec::new()),
            Err(FabulaError::EmptyGroupInvariantViolation { .. })
        ));
    }
}

use crate::model::AttributeValue;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;

/// The set of attribute values a caller currently wants every result to carry.
///
/// Duplicates collapse and insertion order is irrelevant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSelection(BTreeSet<AttributeValue>);

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.0.contains(value)
    }

    pub fn insert(&mut self, value: impl Into<AttributeValue>) -> bool {
        self.0.insert(value.into())
    }

    pub fn remove(&mut self, value: &AttributeValue) -> bool {
        self.0.remove(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &FilterSelection) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl<V: Into<AttributeValue>> FromIterator<V> for FilterSelection {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a FilterSelection {
    type Item = &'a AttributeValue;
    type IntoIter = std::collections::btree_set::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

//! Conjunctive attribute queries over a snapshot and its index.
//!
//! The smallest posting list drives the intersection; every other list is
//! walked with an exponential search, so a query costs at most the sum of the
//! intersected list sizes. Because posting lists are ascending, the matched
//! positions come out in snapshot order without a separate sort.

use crate::index::AttributeIndex;
use crate::model::CatalogEntry;
use crate::selection::FilterSelection;
use crate::snapshot::CatalogSnapshot;
use std::sync::Arc;

/// How multiple selected values combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// An entry must carry every selected value.
    #[default]
    All,
    /// An entry must carry at least one selected value.
    Any,
}

/// Entries carrying every value in `selection`, in snapshot order.
///
/// An empty selection returns the whole snapshot.
pub fn query(
    snapshot: &CatalogSnapshot,
    index: &AttributeIndex,
    selection: &FilterSelection,
) -> Vec<Arc<CatalogEntry>> {
    query_with_mode(snapshot, index, selection, QueryMode::All)
}

pub fn query_with_mode(
    snapshot: &CatalogSnapshot,
    index: &AttributeIndex,
    selection: &FilterSelection,
    mode: QueryMode,
) -> Vec<Arc<CatalogEntry>> {
    debug_assert_eq!(index.sequence(), snapshot.sequence());
    if selection.is_empty() {
        return snapshot.entries().to_vec();
    }
    let positions = match mode {
        QueryMode::All => matching_positions(index, selection),
        QueryMode::Any => union_positions(index, selection),
    };
    debug_assert!(positions.is_sorted());
    positions
        .into_iter()
        .filter_map(|position| snapshot.entries().get(position).cloned())
        .collect()
}

/// Ascending positions of the entries carrying every selected value.
///
/// An empty selection yields every position of the indexed snapshot.
pub fn matching_positions(index: &AttributeIndex, selection: &FilterSelection) -> Vec<usize> {
    if selection.is_empty() {
        return (0..index.entry_count()).collect();
    }
    let mut lists: Vec<&[usize]> = selection
        .iter()
        .map(|value| index.positions(value))
        .collect();
    if lists.iter().any(|list| list.is_empty()) {
        return Vec::new();
    }
    lists.sort_by_key(|list| list.len());
    let (smallest, rest) = lists.split_at(1);
    let mut acc = smallest[0].to_vec();
    for list in rest {
        acc = intersect_sorted(&acc, list);
        if acc.is_empty() {
            break;
        }
    }
    acc
}

fn union_positions(index: &AttributeIndex, selection: &FilterSelection) -> Vec<usize> {
    let mut positions: Vec<usize> = selection
        .iter()
        .flat_map(|value| index.positions(value).iter().copied())
        .collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}

fn intersect_sorted(left: &[usize], right: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(left.len().min(right.len()));
    let mut rest = right;
    for &position in left {
        rest = skip_below(rest, position);
        match rest.first() {
            Some(&candidate) if candidate == position => {
                out.push(position);
                rest = &rest[1..];
            }
            Some(_) => {}
            None => break,
        }
    }
    out
}

/// Drop the prefix of `sorted` that is smaller than `target`.
fn skip_below(sorted: &[usize], target: usize) -> &[usize] {
    let mut low = 0;
    let mut high = 1;
    while high <= sorted.len() && sorted[high - 1] < target {
        low = high;
        high *= 2;
    }
    let high = high.min(sorted.len());
    let offset = low + sorted[low..high].partition_point(|&value| value < target);
    &sorted[offset..]
}

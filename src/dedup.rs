//! Identity-based merging of item lists.
//!
//! Every feed runs its results through [`merge`] before publishing, both on a
//! fresh load and when appending a new page to what is already shown.

use crate::model::Item;
use std::collections::HashSet;

/// Concatenate `lists` in order and keep the first occurrence of each id.
///
/// Later duplicates are dropped even if their fields differ, so an item that
/// is already on screen keeps its position when a new page repeats it.
pub fn merge<I, L>(lists: I) -> Vec<Item>
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = Item>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for item in lists.into_iter().flatten() {
        if seen.insert(item.id) {
            merged.push(item);
        }
    }
    merged
}

/// Single-list form of [`merge`].
pub fn dedup(items: Vec<Item>) -> Vec<Item> {
    merge([items])
}

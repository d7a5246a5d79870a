//! Group-by-key barrier between the map and reduce phases.

use std::collections::HashMap;

use crate::common::{GroupedEntry, Key};

/// Groups every pair across all partitions by key.
///
/// Partitions are walked in order, so each group's values keep their emission
/// order and groups come out in order of their key's first emission.
pub fn group_by_key<K, V, P>(partitions: P) -> Vec<GroupedEntry<K, V>>
where
    K: Key,
    P: IntoIterator<Item = Vec<(K, V)>>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<GroupedEntry<K, V>> = Vec::new();

    for (key, value) in partitions.into_iter().flatten() {
        match index.get(&key) {
            Some(&at) => groups[at].values.push(value),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(GroupedEntry::new(key, vec![value]));
            }
        }
    }

    groups
}

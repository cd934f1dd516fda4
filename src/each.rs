//! Iteration helper over sequences and mappings.
//!
//! Sequences call back with `(index, &item)`, mappings with `(&key, &value)`.
//! A callback returning `false` stops the walk; returning `()` never does.

use std::collections::{BTreeMap, HashMap, btree_map, hash_map};
use std::hash::BuildHasher;
use std::iter::Enumerate;
use std::slice;

/// Return value of an [`each`] callback.
pub trait Flow {
    fn should_continue(self) -> bool;
}

impl Flow for () {
    fn should_continue(self) -> bool {
        true
    }
}

impl Flow for bool {
    fn should_continue(self) -> bool {
        self
    }
}

/// A borrowed collection [`each`] can walk.
pub trait Entries<'a>: Copy {
    type Key;
    type Value: 'a;
    type Iter: Iterator<Item = (Self::Key, &'a Self::Value)>;

    fn entries(self) -> Self::Iter;
}

impl<'a, T: 'a> Entries<'a> for &'a [T] {
    type Key = usize;
    type Value = T;
    type Iter = Enumerate<slice::Iter<'a, T>>;

    fn entries(self) -> Self::Iter {
        self.iter().enumerate()
    }
}

impl<'a, T: 'a> Entries<'a> for &'a Vec<T> {
    type Key = usize;
    type Value = T;
    type Iter = Enumerate<slice::Iter<'a, T>>;

    fn entries(self) -> Self::Iter {
        self.iter().enumerate()
    }
}

impl<'a, T: 'a, const N: usize> Entries<'a> for &'a [T; N] {
    type Key = usize;
    type Value = T;
    type Iter = Enumerate<slice::Iter<'a, T>>;

    fn entries(self) -> Self::Iter {
        self.iter().enumerate()
    }
}

impl<'a, K: 'a, V: 'a> Entries<'a> for &'a BTreeMap<K, V> {
    type Key = &'a K;
    type Value = V;
    type Iter = btree_map::Iter<'a, K, V>;

    fn entries(self) -> Self::Iter {
        self.iter()
    }
}

impl<'a, K: 'a, V: 'a, S: BuildHasher> Entries<'a> for &'a HashMap<K, V, S> {
    type Key = &'a K;
    type Value = V;
    type Iter = hash_map::Iter<'a, K, V>;

    fn entries(self) -> Self::Iter {
        self.iter()
    }
}

/// Call `callback` for every entry of `collection` until it returns `false`.
///
/// Returns `collection` so calls can be chained.
///
/// ```
/// use ajaxify_rs::each;
///
/// let mut seen = Vec::new();
/// each(&[10, 20, 30], |index, value| {
///     seen.push((index, *value));
///     index < 1
/// });
/// assert_eq!(seen, vec![(0, 10), (1, 20)]);
/// ```
pub fn each<'a, C, F, R>(collection: C, mut callback: F) -> C
where
    C: Entries<'a>,
    F: FnMut(C::Key, &'a C::Value) -> R,
    R: Flow,
{
    for (key, value) in collection.entries() {
        if !callback(key, value).should_continue() {
            break;
        }
    }
    collection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_sequences_with_indices() {
        let items = vec![10, 20, 30];
        let mut seen = Vec::new();
        let returned = each(&items, |index, value| seen.push((index, *value)));

        assert_eq!(seen, vec![(0, 10), (1, 20), (2, 30)]);
        assert_eq!(returned, &items);
    }

    #[test]
    fn false_stops_the_walk() {
        let mut calls = 0;
        each(&[10, 20, 30][..], |index, _| {
            calls += 1;
            index != 1
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn walks_mappings_with_keys() {
        let mut map = BTreeMap::new();
        map.insert("b", 2);
        map.insert("a", 1);

        let mut seen = Vec::new();
        each(&map, |key, value| seen.push((*key, *value)));
        assert_eq!(seen, vec![("a", 1), ("b", 2)]);
    }

    #[test]
    fn hash_maps_visit_every_entry() {
        let map: HashMap<_, _> = [("x", 1), ("y", 2), ("z", 3)].into_iter().collect();
        let mut total = 0;
        each(&map, |_, value| total += value);
        assert_eq!(total, 6);
    }

    #[test]
    fn empty_collections_never_call_back() {
        let empty: Vec<u8> = Vec::new();
        let mut called = false;
        each(&empty, |_, _| called = true);
        assert!(!called);
    }
}

//! Fail-fast traversal that can remove as it goes.

use crate::error::CursorError;
use crate::map::HybridHashMap;
use crate::node::{walk, NodeKey};

/// A detached position in a map's table-then-bucket traversal.
///
/// A cursor borrows nothing: each step takes the map explicitly, so the
/// map may be modified between steps. Any structural modification made
/// other than through [`Cursor::remove`] makes the next step fail with
/// [`CursorError::ConcurrentModification`]. A cursor only works with the
/// map that created it; any other map, clones included, is rejected with
/// [`CursorError::ForeignMap`].
///
/// ```
/// use hybrid_hashmap::HybridHashMap;
///
/// let mut m: HybridHashMap<u32, u32> = (0..10).map(|i| (i, i)).collect();
/// let mut cursor = m.cursor();
/// while let Some((_, &v)) = cursor.next(&m).unwrap() {
///     if v % 2 == 1 {
///         cursor.remove(&mut m).unwrap();
///     }
/// }
/// assert_eq!(m.len(), 5);
/// ```
#[derive(Clone, Debug)]
pub struct Cursor {
    table_id: u64,
    expected_mod_count: u64,
    // Next slot to enter.
    bucket: usize,
    // Remaining entries of the current slot, in reverse bucket order.
    pending: Vec<NodeKey>,
    current: Option<NodeKey>,
}

impl<K, V, S, O> HybridHashMap<K, V, S, O> {
    /// Starts a fail-fast traversal positioned before the first entry.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            table_id: self.table.id(),
            expected_mod_count: self.mod_count(),
            bucket: 0,
            pending: Vec::new(),
            current: None,
        }
    }
}

impl Cursor {
    fn check<K, V, S, O>(&self, map: &HybridHashMap<K, V, S, O>) -> Result<(), CursorError> {
        if map.table.id() != self.table_id {
            Err(CursorError::ForeignMap)
        } else if map.mod_count() != self.expected_mod_count {
            Err(CursorError::ConcurrentModification)
        } else {
            Ok(())
        }
    }

    /// Advances to the next entry, or returns `Ok(None)` once exhausted.
    pub fn next<'a, K, V, S, O>(
        &mut self,
        map: &'a HybridHashMap<K, V, S, O>,
    ) -> Result<Option<(&'a K, &'a V)>, CursorError> {
        self.check(map)?;
        let table = &map.table;
        loop {
            if let Some(k) = self.pending.pop() {
                let n = table
                    .nodes
                    .get(k)
                    .ok_or(CursorError::ConcurrentModification)?;
                self.current = Some(k);
                return Ok(Some((&n.key, &n.value)));
            }
            let Some(b) = table.buckets.get(self.bucket) else {
                self.current = None;
                return Ok(None);
            };
            self.bucket += 1;
            self.pending.extend(walk(&table.nodes, b.head()));
            self.pending.reverse();
        }
    }

    /// Removes the entry last returned by [`next`][Cursor::next].
    pub fn remove<K, V, S, O>(&mut self, map: &mut HybridHashMap<K, V, S, O>) -> Result<(K, V), CursorError> {
        self.check(map)?;
        let k = self.current.take().ok_or(CursorError::NoCurrentEntry)?;
        if !map.table.nodes.contains_key(k) {
            return Err(CursorError::ConcurrentModification);
        }
        let entry = map.table.remove_node(k);
        self.expected_mod_count = map.mod_count();
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visits_in_iter_order() {
        let m: HybridHashMap<u32, u32> = (0..64).map(|i| (i, i)).collect();
        let mut cursor = m.cursor();
        let mut seen = Vec::new();
        while let Some((k, _)) = cursor.next(&m).unwrap() {
            seen.push(*k);
        }
        let expected: Vec<u32> = m.keys().copied().collect();
        assert_eq!(seen, expected);
        assert_eq!(cursor.next(&m), Ok(None));
    }

    #[test]
    fn insert_during_traversal_fails_fast() {
        let mut m: HybridHashMap<u32, u32> = (0..4).map(|i| (i, i)).collect();
        let mut cursor = m.cursor();
        assert!(cursor.next(&m).unwrap().is_some());
        m.insert(100, 100);
        assert_eq!(cursor.next(&m), Err(CursorError::ConcurrentModification));
        assert_eq!(
            cursor.remove(&mut m),
            Err(CursorError::ConcurrentModification)
        );
    }

    #[test]
    fn value_replacement_does_not_invalidate() {
        let mut m: HybridHashMap<u32, u32> = (0..4).map(|i| (i, i)).collect();
        let mut cursor = m.cursor();
        let (&k, _) = cursor.next(&m).unwrap().unwrap();
        m.insert(k, 42);
        assert!(cursor.next(&m).is_ok());
    }

    #[test]
    fn remove_requires_a_current_entry() {
        let mut m: HybridHashMap<u32, u32> = (0..2).map(|i| (i, i)).collect();
        let mut cursor = m.cursor();
        assert_eq!(cursor.remove(&mut m), Err(CursorError::NoCurrentEntry));
        let (&k, &v) = cursor.next(&m).unwrap().unwrap();
        assert_eq!(cursor.remove(&mut m), Ok((k, v)));
        assert_eq!(cursor.remove(&mut m), Err(CursorError::NoCurrentEntry));
        assert!(cursor.next(&m).unwrap().is_some());
        assert_eq!(cursor.next(&m), Ok(None));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn other_maps_are_rejected() {
        let mut a: HybridHashMap<u32, u32> = (0..4).map(|i| (i, i)).collect();
        let mut b: HybridHashMap<u32, u32> = (0..4).map(|i| (i, i)).collect();
        let mut twin = a.clone();
        let mut cursor = a.cursor();
        assert_eq!(cursor.next(&b), Err(CursorError::ForeignMap));
        assert_eq!(cursor.next(&twin), Err(CursorError::ForeignMap));
        assert!(cursor.next(&a).unwrap().is_some());
        assert_eq!(cursor.remove(&mut b), Err(CursorError::ForeignMap));
        assert_eq!(cursor.remove(&mut twin), Err(CursorError::ForeignMap));
        assert_eq!((b.len(), twin.len()), (4, 4));
        assert!(cursor.remove(&mut a).is_ok());
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn removing_everything_visits_each_entry_once() {
        let mut m: HybridHashMap<u32, u32> = (0..300).map(|i| (i, i)).collect();
        let mut cursor = m.cursor();
        let mut removed = 0;
        while cursor.next(&m).unwrap().is_some() {
            cursor.remove(&mut m).unwrap();
            removed += 1;
        }
        assert_eq!(removed, 300);
        assert!(m.is_empty());
        m.check_invariants().unwrap();
    }
}

//! HybridHashMap: the public map over `RawTable`.

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;

use hashbrown::hash_map::DefaultHashBuilder;

use crate::error::InvariantViolation;
use crate::hash::{make_hash, table_size_for};
use crate::node::NodeKey;
use crate::order::{LookupTieBreak, TieBreak, Unordered};
use crate::table::{BucketKind, RawTable, DEFAULT_LOAD_FACTOR};

/// A hash map whose buckets are collision chains that turn into red-black
/// trees when they grow long.
///
/// Lookups, inserts and removals are O(1) on average and O(log n) in a
/// bucket that has been treeified, so a flood of colliding keys degrades to
/// logarithmic rather than linear time.
///
/// # Examples
///
/// ```
/// use hybrid_hashmap::HybridHashMap;
///
/// let mut m = HybridHashMap::new();
/// m.insert("a", 1);
/// m.insert("b", 2);
/// assert_eq!(m.get("a"), Some(&1));
/// assert_eq!(m.insert("a", 10), Some(1));
/// assert_eq!(m.remove("b"), Some(2));
/// assert_eq!(m.len(), 1);
/// ```
///
/// The fourth parameter is the tie-break order for hash-equal keys inside
/// tree buckets, chosen on the builder (see
/// [`natural_key_order`][crate::HybridHashMapBuilder::natural_key_order]).
/// With an order, tree lookups descend a single path; without one they may
/// have to search both subtrees of every hash-equal entry.
#[derive(Clone)]
pub struct HybridHashMap<K, V, S = DefaultHashBuilder, O = Unordered> {
    hash_builder: S,
    order: O,
    pub(crate) table: RawTable<K, V>,
}

impl<K, V> HybridHashMap<K, V> {
    /// Creates an empty map with the default capacity (16) and load factor
    /// (0.75). No table is allocated until the first insert.
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates an empty map whose first table holds `capacity` rounded up to
    /// a power of two (at most 2^30).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for HybridHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HybridHashMap<K, V, S> {
    /// Creates an empty map that hashes keys with `hash_builder`, with the
    /// default capacity and load factor.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::from_parts(hash_builder, 0, DEFAULT_LOAD_FACTOR, Unordered)
    }

    /// Creates an empty map that hashes keys with `hash_builder` and whose
    /// first table holds `capacity` rounded up to a power of two.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::from_parts(hash_builder, table_size_for(capacity), DEFAULT_LOAD_FACTOR, Unordered)
    }
}

impl<K, V, S, O> HybridHashMap<K, V, S, O> {
    pub(crate) fn from_parts(hash_builder: S, initial_capacity: usize, load_factor: f32, order: O) -> Self
    where
        O: TieBreak<K>,
    {
        let key_order = order.key_order();
        Self {
            hash_builder,
            order,
            table: RawTable::new(initial_capacity, load_factor, key_order),
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Number of buckets: the allocated table length, or the length the
    /// first insert will allocate.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    /// Occupancy above which the next insert grows the table.
    /// `usize::MAX` once the table has reached its maximum size.
    pub fn threshold(&self) -> usize {
        self.table.threshold()
    }

    pub(crate) fn mod_count(&self) -> u64 {
        self.table.mod_count()
    }

    /// Removes every entry. The table keeps its capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.table.nodes.values().any(|n| n.value == *value)
    }

    /// Replaces every value with `f(key, value)`. Not a structural
    /// modification.
    pub fn replace_all<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V) -> V,
    {
        for n in self.table.nodes.values_mut() {
            let v = f(&n.key, &n.value);
            n.value = v;
        }
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let doomed: Vec<NodeKey> = self
            .table
            .nodes
            .iter_mut()
            .filter_map(|(k, n)| (!f(&n.key, &mut n.value)).then_some(k))
            .collect();
        for k in doomed {
            self.table.remove_node(k);
        }
    }

    /// Verifies every structural invariant of the table and its buckets.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.table.check_invariants()
    }

    fn entry_ref(&self, p: NodeKey) -> (&K, &V) {
        let n = &self.table.nodes[p];
        (&n.key, &n.value)
    }

    fn value_mut(&mut self, p: NodeKey) -> &mut V {
        &mut self.table.nodes[p].value
    }
}

impl<K, V, S, O> HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        make_hash(&self.hash_builder, q)
    }

    fn find<Q>(&self, q: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        let hash = self.make_hash(q);
        let ord = |k: &K| self.order.compare(q, k).unwrap_or(Ordering::Equal);
        self.table.find(hash, &|k: &K| k.borrow() == q, Some(&ord))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        self.find(q).map(|p| &self.table.nodes[p].value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        self.find(q).map(|p| self.entry_ref(p))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        let p = self.find(q)?;
        Some(self.value_mut(p))
    }

    /// The value for `q`, or `default` when absent.
    pub fn get_or<'a, Q>(&'a self, q: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        self.get(q).unwrap_or(default)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        self.find(q).is_some()
    }

    /// Inserts `key -> value`, returning the previous value if the key was
    /// present. Replacing a value keeps the stored key and is not a
    /// structural modification.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.make_hash(&key);
        match self.table.find_key(hash, &key) {
            Some(p) => Some(core::mem::replace(self.value_mut(p), value)),
            None => {
                self.table.insert_unique(hash, key, value);
                None
            }
        }
    }

    /// Inserts only when `key` is absent. Returns the value already present
    /// otherwise, leaving it unchanged.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        let hash = self.make_hash(&key);
        match self.table.find_key(hash, &key) {
            Some(p) => Some(&self.table.nodes[p].value),
            None => {
                self.table.insert_unique(hash, key, value);
                None
            }
        }
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        let p = self.find(q)?;
        Some(self.table.remove_node(p))
    }

    /// Removes `q` only while it maps to `value`.
    pub fn remove_if_eq<Q>(&mut self, q: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
        V: PartialEq,
    {
        match self.find(q) {
            Some(p) if self.table.nodes[p].value == *value => {
                self.table.remove_node(p);
                true
            }
            _ => false,
        }
    }

    /// Replaces the value of `q` only if present; returns the old value.
    pub fn replace<Q>(&mut self, q: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
    {
        let p = self.find(q)?;
        Some(core::mem::replace(self.value_mut(p), value))
    }

    /// Replaces the value of `q` only while it equals `old`.
    pub fn replace_if_eq<Q>(&mut self, q: &Q, old: &V, new: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
        V: PartialEq,
    {
        match self.find(q) {
            Some(p) if self.table.nodes[p].value == *old => {
                *self.value_mut(p) = new;
                true
            }
            _ => false,
        }
    }

    /// Returns the value for `key`, first inserting `f(&key)` when absent.
    /// If `f` returns `None` nothing is inserted.
    pub fn compute_if_absent<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        let p = match self.table.find_key(hash, &key) {
            Some(p) => p,
            None => {
                let value = f(&key)?;
                self.table.insert_unique(hash, key, value)
            }
        };
        Some(self.value_mut(p))
    }

    /// Recomputes the value of a present key. `None` from `f` removes it.
    pub fn compute_if_present<Q, F>(&mut self, q: &Q, f: F) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: LookupTieBreak<K, Q>,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let p = self.find(q)?;
        let (k, v) = self.entry_ref(p);
        match f(k, v) {
            Some(v) => {
                let slot = self.value_mut(p);
                *slot = v;
                Some(slot)
            }
            None => {
                self.table.remove_node(p);
                None
            }
        }
    }

    /// Computes a new value from the current one (or its absence).
    /// `None` from `f` removes the mapping, or leaves it absent.
    pub fn compute<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        match self.table.find_key(hash, &key) {
            Some(p) => {
                let (k, v) = self.entry_ref(p);
                match f(k, Some(v)) {
                    Some(v) => {
                        let slot = self.value_mut(p);
                        *slot = v;
                        Some(slot)
                    }
                    None => {
                        self.table.remove_node(p);
                        None
                    }
                }
            }
            None => {
                let value = f(&key, None)?;
                let p = self.table.insert_unique(hash, key, value);
                Some(self.value_mut(p))
            }
        }
    }

    /// Inserts `value` when `key` is absent, otherwise replaces the value
    /// with `f(old, value)`; `None` from `f` removes the mapping.
    pub fn merge<F>(&mut self, key: K, value: V, f: F) -> Option<&mut V>
    where
        F: FnOnce(&V, V) -> Option<V>,
    {
        let hash = self.make_hash(&key);
        match self.table.find_key(hash, &key) {
            Some(p) => match f(&self.table.nodes[p].value, value) {
                Some(v) => {
                    let slot = self.value_mut(p);
                    *slot = v;
                    Some(slot)
                }
                None => {
                    self.table.remove_node(p);
                    None
                }
            },
            None => {
                let p = self.table.insert_unique(hash, key, value);
                Some(self.value_mut(p))
            }
        }
    }

    /// Makes room for at least `additional` more entries without further
    /// growth.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve_for(self.len().saturating_add(additional));
    }

    /// Inserts every pair of `entries`, sizing the table once for their
    /// count first.
    pub fn put_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = entries.into_iter();
        self.table.reserve_for(iter.len());
        for (k, v) in iter {
            self.insert(k, v);
        }
    }

    /// Current representation of the bucket `q` hashes to, or `None` when
    /// that bucket is empty.
    pub fn bucket_kind<Q>(&self, q: &Q) -> Option<BucketKind>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        self.table.bucket_kind(self.make_hash(q))
    }
}

impl<K, V, S, O> fmt::Debug for HybridHashMap<K, V, S, O>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, O> PartialEq for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    O: LookupTieBreak<K, K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S, O> Eq for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
    O: LookupTieBreak<K, K>,
{
}

impl<K, Q, V, S, O> Index<&Q> for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
    O: LookupTieBreak<K, Q>,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S, O> FromIterator<(K, V)> for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    O: TieBreak<K> + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::from_parts(S::default(), 0, DEFAULT_LOAD_FACTOR, O::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S, O> Extend<(K, V)> for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        // Duplicates in a non-empty map are likely; size for half the hint.
        let hint = iter.size_hint().0;
        let additional = if self.is_empty() { hint } else { (hint + 1) / 2 };
        self.reserve(additional);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S, O> Extend<(&'a K, &'a V)> for HybridHashMap<K, V, S, O>
where
    K: Eq + Hash + Copy,
    V: Copy,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: T) {
        self.extend(iter.into_iter().map(|(&k, &v)| (k, v)));
    }
}

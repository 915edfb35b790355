//! Tie-break orders for hash-equal keys inside tree buckets.
//!
//! The order is part of the map's type so that lookups by a borrowed key
//! can use it too: `Natural` compares any `Q: Ord` that `K` borrows as,
//! while a `ByFn` order only knows how to compare two full keys.

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;

/// An order on keys consulted between hash and insertion identity.
pub trait TieBreak<K> {
    /// Comparator applied when a new entry is linked into a tree.
    fn key_order(&self) -> Option<fn(&K, &K) -> Ordering>;
}

/// A [`TieBreak`] that can also place a borrowed query `Q`.
pub trait LookupTieBreak<K, Q: ?Sized>: TieBreak<K> {
    /// Position of `query` relative to `key`, or `None` when the order
    /// cannot tell and both subtrees have to be searched.
    fn compare(&self, query: &Q, key: &K) -> Option<Ordering>;
}

/// No tie-break: hash-equal keys are ordered by insertion identity only.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Unordered;

impl<K> TieBreak<K> for Unordered {
    #[inline]
    fn key_order(&self) -> Option<fn(&K, &K) -> Ordering> {
        None
    }
}

impl<K, Q: ?Sized> LookupTieBreak<K, Q> for Unordered {
    #[inline]
    fn compare(&self, _query: &Q, _key: &K) -> Option<Ordering> {
        None
    }
}

/// `K`'s own `Ord`. Borrowed lookups compare through `Borrow<Q>`, whose
/// contract requires `Q`'s order to agree with `K`'s.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Natural;

impl<K: Ord> TieBreak<K> for Natural {
    #[inline]
    fn key_order(&self) -> Option<fn(&K, &K) -> Ordering> {
        Some(<K as Ord>::cmp)
    }
}

impl<K, Q> LookupTieBreak<K, Q> for Natural
where
    K: Ord + Borrow<Q>,
    Q: ?Sized + Ord,
{
    #[inline]
    fn compare(&self, query: &Q, key: &K) -> Option<Ordering> {
        Some(query.cmp(key.borrow()))
    }
}

/// A caller-supplied comparator. It only applies to full keys, so lookups
/// through a `ByFn` map take `&K`.
pub struct ByFn<K>(pub(crate) fn(&K, &K) -> Ordering);

impl<K> Clone for ByFn<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for ByFn<K> {}

impl<K> fmt::Debug for ByFn<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByFn")
    }
}

impl<K> TieBreak<K> for ByFn<K> {
    #[inline]
    fn key_order(&self) -> Option<fn(&K, &K) -> Ordering> {
        Some(self.0)
    }
}

impl<K> LookupTieBreak<K, K> for ByFn<K> {
    #[inline]
    fn compare(&self, query: &K, key: &K) -> Option<Ordering> {
        Some((self.0)(query, key))
    }
}

use crate::error::ConfigError;
use crate::hash::table_size_for;
use crate::map::HybridHashMap;
use crate::order::{ByFn, Natural, TieBreak, Unordered};
use crate::table::DEFAULT_LOAD_FACTOR;

use core::cmp::Ordering;
use core::hash::BuildHasher;
use core::marker::PhantomData;

use hashbrown::hash_map::DefaultHashBuilder;

/// Builds a [`HybridHashMap`] with various configuration knobs.
///
/// # Examples
///
/// ```rust
/// use hybrid_hashmap::HybridHashMapBuilder;
///
/// let mut map = HybridHashMapBuilder::new()
///     // First table holds 128 buckets.
///     .initial_capacity(100)
///     // Grow once occupancy passes half the capacity.
///     .load_factor(0.5)
///     // Order colliding keys by `Ord` inside tree buckets.
///     .natural_key_order()
///     .build()
///     .unwrap();
///
/// map.insert(1u64, "one");
/// assert_eq!(map.capacity(), 128);
/// assert_eq!(map.threshold(), 64);
/// ```
pub struct HybridHashMapBuilder<K, V, O = Unordered> {
    initial_capacity: Option<usize>,
    load_factor: f32,
    order: O,
    entry_type: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Default for HybridHashMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HybridHashMapBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            initial_capacity: None,
            load_factor: DEFAULT_LOAD_FACTOR,
            order: Unordered,
            entry_type: PhantomData,
        }
    }
}

impl<K, V, O> HybridHashMapBuilder<K, V, O> {
    /// Sets the capacity of the first table. Rounded up to a power of two
    /// and capped at 2^30.
    pub fn initial_capacity(self, capacity: usize) -> Self {
        Self {
            initial_capacity: Some(capacity),
            ..self
        }
    }

    /// Sets the load factor. `build*` rejects values that are not positive
    /// and finite.
    pub fn load_factor(self, load_factor: f32) -> Self {
        Self {
            load_factor,
            ..self
        }
    }

    /// Orders hash-equal keys inside tree buckets with `cmp` before falling
    /// back to insertion identity. Lookups on the built map then take `&K`.
    ///
    /// `cmp` must be consistent with `Eq`: keys it reports as `Equal` must
    /// be equal.
    pub fn key_order(self, cmp: fn(&K, &K) -> Ordering) -> HybridHashMapBuilder<K, V, ByFn<K>> {
        self.with_order(ByFn(cmp))
    }

    fn with_order<P>(self, order: P) -> HybridHashMapBuilder<K, V, P> {
        HybridHashMapBuilder {
            initial_capacity: self.initial_capacity,
            load_factor: self.load_factor,
            order,
            entry_type: PhantomData,
        }
    }

    /// Builds a `HybridHashMap<K, V>` with the default hasher.
    pub fn build(self) -> Result<HybridHashMap<K, V, DefaultHashBuilder, O>, ConfigError>
    where
        O: TieBreak<K>,
    {
        self.build_with_hasher(DefaultHashBuilder::default())
    }

    /// Builds a `HybridHashMap<K, V, S>` with the given `hasher`.
    pub fn build_with_hasher<S>(self, hasher: S) -> Result<HybridHashMap<K, V, S, O>, ConfigError>
    where
        S: BuildHasher,
        O: TieBreak<K>,
    {
        let load_factor = validate_load_factor(self.load_factor)?;
        let initial_capacity = self.initial_capacity.map_or(0, table_size_for);
        Ok(HybridHashMap::from_parts(
            hasher,
            initial_capacity,
            load_factor,
            self.order,
        ))
    }
}

impl<K: Ord, V, O> HybridHashMapBuilder<K, V, O> {
    /// Uses `K`'s `Ord` implementation as the tree tie-break. Lookups by any
    /// `Q: Ord` that `K` borrows as follow it too.
    pub fn natural_key_order(self) -> HybridHashMapBuilder<K, V, Natural> {
        self.with_order(Natural)
    }
}

pub(crate) fn validate_load_factor(load_factor: f32) -> Result<f32, ConfigError> {
    if load_factor > 0.0 && load_factor.is_finite() {
        Ok(load_factor)
    } else {
        Err(ConfigError::IllegalLoadFactor(load_factor))
    }
}

//! Persisted-state layout.
//!
//! A map persists as its load factor, its capacity, its occupancy and then
//! its entries in table-then-bucket order. The capacity is informational;
//! restoring sizes the table from occupancy and load factor and replays
//! the entries as ordinary inserts. The recorded occupancy is not trusted
//! beyond a fixed memory budget; past it the table grows as entries arrive.

use core::hash::{BuildHasher, Hash};
use core::mem;

use crate::builder::validate_load_factor;
use crate::error::ConfigError;
use crate::hash::table_size_for;
use crate::map::HybridHashMap;
use crate::node::{Bucket, Node};
use crate::order::TieBreak;
use crate::table::{DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY};

/// Leading fields of the persisted layout.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PersistedHeader {
    pub load_factor: f32,
    pub capacity: usize,
    pub len: usize,
}

const MIN_RESTORE_LOAD_FACTOR: f32 = 0.25;
const MAX_RESTORE_LOAD_FACTOR: f32 = 4.0;
/// Most memory a recorded occupancy may reserve before any entry is read.
const MAX_PRESIZE_BYTES: usize = 1024 * 1024;

/// `len` capped to the entries (plus one slot each) that fit in
/// `MAX_PRESIZE_BYTES`.
fn cautious_len<K, V>(len: usize) -> usize {
    let per_entry = mem::size_of::<Node<K, V>>() + mem::size_of::<Bucket>();
    len.min(MAX_PRESIZE_BYTES / per_entry)
}

/// Capacity that holds `len` entries without growth. The load factor is
/// clamped so that a corrupt header cannot request an absurd table.
fn restore_capacity(len: usize, load_factor: f32) -> usize {
    let lf = load_factor.clamp(MIN_RESTORE_LOAD_FACTOR, MAX_RESTORE_LOAD_FACTOR);
    let fc = len as f64 / lf as f64 + 1.0;
    if fc < DEFAULT_INITIAL_CAPACITY as f64 {
        DEFAULT_INITIAL_CAPACITY
    } else if fc >= MAXIMUM_CAPACITY as f64 {
        MAXIMUM_CAPACITY
    } else {
        table_size_for(fc as usize)
    }
}

impl<K, V, S, O> HybridHashMap<K, V, S, O> {
    pub fn persisted_header(&self) -> PersistedHeader {
        PersistedHeader {
            load_factor: self.load_factor(),
            capacity: self.capacity(),
            len: self.len(),
        }
    }

    /// An empty map with `header`'s load factor, sized to receive
    /// `header.len` entries (up to a fixed memory budget).
    pub fn presized(header: &PersistedHeader, hasher: S) -> Result<Self, ConfigError>
    where
        O: TieBreak<K> + Default,
    {
        let load_factor = validate_load_factor(header.load_factor)?;
        let len = cautious_len::<K, V>(header.len);
        let initial_capacity = if len > 0 {
            restore_capacity(len, load_factor)
        } else {
            0
        };
        Ok(Self::from_parts(hasher, initial_capacity, load_factor, O::default()))
    }
}

impl<K, V, S, O> HybridHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: TieBreak<K> + Default,
{
    /// Rebuilds a map from a header and its entries. Later duplicates of a
    /// key overwrite earlier ones.
    pub fn restore<I>(header: &PersistedHeader, hasher: S, entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::presized(header, hasher)?;
        for (k, v) in entries {
            map.insert(k, v);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;

    use core::fmt;
    use core::marker::PhantomData;

    use ::serde::de::{self, DeserializeSeed, Deserializer, SeqAccess, Visitor};
    use ::serde::ser::{SerializeSeq, SerializeTuple, Serializer};
    use ::serde::{Deserialize, Serialize};

    struct Entries<'a, K, V, S, O>(&'a HybridHashMap<K, V, S, O>);

    impl<K, V, S, O> Serialize for Entries<'_, K, V, S, O>
    where
        K: Serialize,
        V: Serialize,
    {
        fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
            let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
            for entry in self.0.iter() {
                seq.serialize_element(&entry)?;
            }
            seq.end()
        }
    }

    impl<K, V, S, O> Serialize for HybridHashMap<K, V, S, O>
    where
        K: Serialize,
        V: Serialize,
    {
        fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
            let header = self.persisted_header();
            let mut tuple = serializer.serialize_tuple(4)?;
            tuple.serialize_element(&header.load_factor)?;
            tuple.serialize_element(&(header.capacity as u64))?;
            tuple.serialize_element(&(header.len as i64))?;
            tuple.serialize_element(&Entries(self))?;
            tuple.end()
        }
    }

    impl<'de, K, V, S, O> Deserialize<'de> for HybridHashMap<K, V, S, O>
    where
        K: Eq + Hash + Deserialize<'de>,
        V: Deserialize<'de>,
        S: BuildHasher + Default,
        O: TieBreak<K> + Default,
    {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_tuple(4, MapVisitor { phantom: PhantomData })
        }
    }

    struct MapVisitor<K, V, S, O> {
        phantom: PhantomData<fn() -> (K, V, S, O)>,
    }

    impl<'de, K, V, S, O> Visitor<'de> for MapVisitor<K, V, S, O>
    where
        K: Eq + Hash + Deserialize<'de>,
        V: Deserialize<'de>,
        S: BuildHasher + Default,
        O: TieBreak<K> + Default,
    {
        type Value = HybridHashMap<K, V, S, O>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a persisted hybrid hash map")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let load_factor: f32 = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(0, &self))?;
            let capacity: u64 = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(1, &self))?;
            let len: i64 = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(2, &self))?;
            let len = usize::try_from(len)
                .map_err(|_| de::Error::custom(format_args!("illegal mappings count: {len}")))?;
            let header = PersistedHeader {
                load_factor,
                capacity: usize::try_from(capacity).unwrap_or(usize::MAX),
                len,
            };
            let mut map: HybridHashMap<K, V, S, O> =
                HybridHashMap::presized(&header, S::default()).map_err(de::Error::custom)?;
            seq.next_element_seed(EntriesSeed {
                map: &mut map,
                expected: len,
            })?
            .ok_or_else(|| de::Error::invalid_length(3, &self))?;
            Ok(map)
        }
    }

    struct EntriesSeed<'m, K, V, S, O> {
        map: &'m mut HybridHashMap<K, V, S, O>,
        expected: usize,
    }

    impl<'de, K, V, S, O> DeserializeSeed<'de> for EntriesSeed<'_, K, V, S, O>
    where
        K: Eq + Hash + Deserialize<'de>,
        V: Deserialize<'de>,
        S: BuildHasher,
    {
        type Value = ();

        fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
            deserializer.deserialize_seq(self)
        }
    }

    impl<'de, K, V, S, O> Visitor<'de> for EntriesSeed<'_, K, V, S, O>
    where
        K: Eq + Hash + Deserialize<'de>,
        V: Deserialize<'de>,
        S: BuildHasher,
    {
        type Value = ();

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(formatter, "a sequence of {} key/value pairs", self.expected)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
            let mut read = 0;
            while let Some((k, v)) = seq.next_element::<(K, V)>()? {
                read += 1;
                if read > self.expected {
                    return Err(de::Error::invalid_length(read, &self));
                }
                self.map.insert(k, v);
            }
            if read != self.expected {
                return Err(de::Error::invalid_length(read, &self));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_capacity_follows_occupancy() {
        assert_eq!(restore_capacity(1, 0.75), 16);
        assert_eq!(restore_capacity(12, 0.75), 32);
        assert_eq!(restore_capacity(100, 0.75), 256);
        // Clamped to 4.0 and 0.25.
        assert_eq!(restore_capacity(1000, 100.0), 256);
        assert_eq!(restore_capacity(100, 0.01), 512);
        assert_eq!(restore_capacity(usize::MAX / 2, 0.75), MAXIMUM_CAPACITY);
    }

    #[test]
    fn header_round_trip() {
        let mut m: HybridHashMap<u32, &str> = HybridHashMap::new();
        for i in 0..20 {
            m.insert(i, "x");
        }
        let header = m.persisted_header();
        assert_eq!(
            header,
            PersistedHeader {
                load_factor: 0.75,
                capacity: 32,
                len: 20
            }
        );
        let restored: HybridHashMap<u32, &str> = HybridHashMap::restore(&header, m.hasher().clone(), m.iter().map(|(&k, &v)| (k, v))).unwrap();
        assert_eq!(restored, m);
        assert_eq!(restored.capacity(), 32);
        restored.check_invariants().unwrap();
    }

    #[test]
    fn presized_keeps_recorded_load_factor() {
        let header = PersistedHeader {
            load_factor: 0.5,
            capacity: 4,
            len: 40,
        };
        let m: HybridHashMap<u8, u8> = HybridHashMap::presized(&header, Default::default()).unwrap();
        assert_eq!(m.load_factor(), 0.5);
        assert_eq!(m.capacity(), 128);
        assert_eq!(m.threshold(), 64);

        let empty = PersistedHeader { len: 0, ..header };
        let m: HybridHashMap<u8, u8> = HybridHashMap::presized(&empty, Default::default()).unwrap();
        assert_eq!(m.capacity(), 16);
    }

    #[test]
    fn presize_ignores_absurd_recorded_occupancy() {
        for len in [20_000_000, 1 << 30, usize::MAX] {
            let header = PersistedHeader {
                load_factor: 0.75,
                capacity: MAXIMUM_CAPACITY,
                len,
            };
            let m: HybridHashMap<u8, u8> = HybridHashMap::presized(&header, Default::default()).unwrap();
            assert!(m.capacity() <= 1 << 16, "len {len} presized {}", m.capacity());
            assert_eq!(m.load_factor(), 0.75);
        }
    }

    #[test]
    fn restore_grows_past_the_presize_budget() {
        let n = 2 * cautious_len::<u64, u64>(usize::MAX);
        let header = PersistedHeader {
            load_factor: 0.75,
            capacity: 0,
            len: n,
        };
        let m: HybridHashMap<u64, u64> =
            HybridHashMap::restore(&header, Default::default(), (0..n as u64).map(|i| (i, i))).unwrap();
        assert_eq!(m.len(), n);
        assert!(m.threshold() >= n);
        m.check_invariants().unwrap();
    }

    #[test]
    fn presized_rejects_bad_load_factor() {
        let header = PersistedHeader {
            load_factor: f32::NAN,
            capacity: 16,
            len: 1,
        };
        let res: Result<HybridHashMap<u8, u8>, _> = HybridHashMap::presized(&header, Default::default());
        assert!(matches!(res, Err(ConfigError::IllegalLoadFactor(_))));
    }
}

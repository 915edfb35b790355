#![cfg(test)]

// Property tests for HybridHashMap kept inside the crate so they can reach
// the table internals (modification counter, bucket representation).

use crate::{BucketKind, HybridHashMap, HybridHashMapBuilder, LookupTieBreak};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    ComputeIfPresent(usize, bool),
    Reserve(u8),
    Iterate,
    Clear,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario(max_pool: usize, max_ops: usize) -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::btree_set("[a-z]{1,6}", 1..=max_pool).prop_flat_map(move |pool| {
        let pool: Vec<String> = pool.into_iter().collect();
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            8 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            4 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,6}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (idx.clone(), any::<bool>()).prop_map(|(i, keep)| OpI::ComputeIfPresent(i, keep)),
            1 => any::<u8>().prop_map(OpI::Reserve),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..max_ops).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives `sut` and a std HashMap model through `ops`, checking equivalence
// and every structural invariant after each step.
fn run_state_machine<S, O>(
    mut sut: HybridHashMap<Key, i32, S, O>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
    O: LookupTieBreak<Key, Key> + LookupTieBreak<Key, str>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        let mod_count = sut.mod_count();
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                let prev = sut.insert(k.clone(), v);
                prop_assert_eq!(prev, model.insert(k, v));
                if prev.is_some() {
                    prop_assert_eq!(sut.mod_count(), mod_count, "replacement is not structural");
                }
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                let removed = sut.remove_entry(k.0.as_str());
                prop_assert_eq!(removed.as_ref().map(|(_, v)| *v), model.remove(&k));
                match removed {
                    Some((kk, _)) => prop_assert_eq!(kk, k),
                    None => prop_assert_eq!(sut.mod_count(), mod_count, "absent removal"),
                }
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.get(k.0.as_str()), model.get(&k));
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(vr) = sut.get_mut(&k) {
                    *vr = vr.saturating_add(d);
                    let mv = model.get_mut(&k).expect("present in model");
                    *mv = mv.saturating_add(d);
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            OpI::ComputeIfPresent(i, keep) => {
                let k = key_from(pool, i);
                let r = sut
                    .compute_if_present(&k, |_, v| keep.then(|| v.wrapping_neg()))
                    .map(|v| *v);
                let expected = match model.get(&k).copied() {
                    Some(v) if keep => {
                        model.insert(k.clone(), v.wrapping_neg());
                        Some(v.wrapping_neg())
                    }
                    Some(_) => {
                        model.remove(&k);
                        None
                    }
                    None => None,
                };
                prop_assert_eq!(r, expected);
            }
            OpI::Reserve(n) => {
                sut.reserve(n as usize);
                prop_assert!(sut.len() + n as usize <= sut.threshold());
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                prop_assert_eq!(sut.iter().len(), model.len());
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
        }

        // Post-conditions after each op
        if let Err(e) = sut.check_invariants() {
            prop_assert!(false, "invariant violated: {}", e);
        }
        prop_assert!(sut.capacity().is_power_of_two());
        prop_assert!(sut.len() <= sut.threshold());
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap
// with a well-distributed hasher.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(12, 80)) {
        run_state_machine(HybridHashMap::new(), &pool, ops)?;
    }
}

// Hashes every key to the same value, so all entries share one bucket and
// the bucket cycles between chain and tree.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Hashes a key to its first byte only: a handful of buckets with long
// runs of equal hashes.
#[derive(Clone, Default)]
struct FirstByteBuildHasher;
struct FirstByteHasher(Option<u64>);
impl BuildHasher for FirstByteBuildHasher {
    type Hasher = FirstByteHasher;
    fn build_hasher(&self) -> Self::Hasher {
        FirstByteHasher(None)
    }
}
impl Hasher for FirstByteHasher {
    fn write(&mut self, bytes: &[u8]) {
        if self.0.is_none() {
            self.0 = bytes.first().map(|&b| b as u64 * 0x1_0001);
        }
    }
    fn finish(&self) -> u64 {
        self.0.unwrap_or(0)
    }
}

// Property: Same state-machine invariants under worst-case collision
// behavior, with enough keys for buckets to treeify and split.
proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario(40, 200)) {
        run_state_machine(HybridHashMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_natural_order((pool, ops) in arb_scenario(40, 200)) {
        let sut = HybridHashMapBuilder::new()
            .natural_key_order()
            .build_with_hasher(ConstBuildHasher)
            .unwrap();
        run_state_machine(sut, &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_clustered_hashes((pool, ops) in arb_scenario(40, 200)) {
        let sut = HybridHashMapBuilder::new()
            .load_factor(2.0)
            .build_with_hasher(FirstByteBuildHasher)
            .unwrap();
        run_state_machine(sut, &pool, ops)?;
    }
}

// Property: Inserting n colliding keys always yields a tree once n >= 10
// (two growth steps from 16 to 64, then promotion), and removing down to
// six entries always yields a chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_colliding_bucket_representation(n in 10usize..80, keep in 0usize..=6) {
        let mut m: HybridHashMap<u32, u32, ConstBuildHasher> = HybridHashMap::with_hasher(ConstBuildHasher);
        for i in 0..n as u32 {
            m.insert(i, i);
        }
        prop_assert_eq!(m.bucket_kind(&0), Some(BucketKind::Tree { len: n }));
        for i in keep as u32..n as u32 {
            prop_assert_eq!(m.remove(&i), Some(i));
        }
        let kind = m.bucket_kind(&0);
        if keep == 0 {
            prop_assert_eq!(kind, None);
        } else {
            prop_assert_eq!(kind, Some(BucketKind::Chain { len: keep }));
        }
        prop_assert!(m.check_invariants().is_ok());
    }
}

//! Bucket table: the slot array, the entry arena, growth and the
//! chain/tree promotion rules. Hashing happens one layer up; everything
//! here works on precomputed 32-bit spread hashes.

use core::cmp::Ordering;
use core::mem;
use core::sync::atomic::{self, AtomicU64};

use slotmap::SlotMap;

use crate::error::InvariantViolation;
use crate::hash::{index_for, table_size_for, threshold_for};
use crate::node::{walk, Arena, Bucket, Node, NodeKey, OrderList, TreeLinks};
use crate::tree::{self, KeyOrder};

pub(crate) const DEFAULT_INITIAL_CAPACITY: usize = 1 << 4;
pub(crate) const MAXIMUM_CAPACITY: usize = 1 << 30;
pub(crate) const DEFAULT_LOAD_FACTOR: f32 = 0.75;
/// Chain length at which a bucket becomes a tree.
pub(crate) const TREEIFY_THRESHOLD: usize = 8;
/// Entry count at or below which a tree bucket becomes a chain again.
pub(crate) const UNTREEIFY_THRESHOLD: usize = 6;
/// Smallest capacity at which buckets may be treeified; below it the table
/// grows instead.
pub(crate) const MIN_TREEIFY_CAPACITY: usize = 64;

/// Representation of a bucket, as reported by
/// [`HybridHashMap::bucket_kind`][crate::HybridHashMap::bucket_kind].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BucketKind {
    Chain { len: usize },
    Tree { len: usize },
}

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) struct RawTable<K, V> {
    // Distinguishes tables for detached cursors; a clone gets a fresh one.
    id: u64,
    pub(crate) buckets: Vec<Bucket>,
    pub(crate) nodes: Arena<K, V>,
    threshold: usize,
    // Capacity for the first allocation; 0 selects the default.
    initial_capacity: usize,
    load_factor: f32,
    mod_count: u64,
    key_order: KeyOrder<K>,
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn new(initial_capacity: usize, load_factor: f32, key_order: KeyOrder<K>) -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, atomic::Ordering::Relaxed),
            buckets: Vec::new(),
            nodes: SlotMap::with_key(),
            threshold: 0,
            initial_capacity,
            load_factor,
            mod_count: 0,
            key_order,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        if !self.buckets.is_empty() {
            self.buckets.len()
        } else if self.initial_capacity > 0 {
            self.initial_capacity
        } else {
            DEFAULT_INITIAL_CAPACITY
        }
    }

    pub(crate) fn threshold(&self) -> usize {
        if self.buckets.is_empty() {
            threshold_for(self.capacity(), self.load_factor)
        } else {
            self.threshold
        }
    }

    #[inline]
    pub(crate) fn load_factor(&self) -> f32 {
        self.load_factor
    }

    #[inline]
    pub(crate) fn mod_count(&self) -> u64 {
        self.mod_count
    }

    #[inline]
    fn bucket_index(&self, hash: u32) -> Option<usize> {
        if self.buckets.is_empty() {
            None
        } else {
            Some(index_for(hash, self.buckets.len()))
        }
    }

    pub(crate) fn bucket_kind(&self, hash: u32) -> Option<BucketKind> {
        match self.buckets[self.bucket_index(hash)?] {
            Bucket::Empty => None,
            Bucket::Chain { len, .. } => Some(BucketKind::Chain { len }),
            Bucket::Tree { len, .. } => Some(BucketKind::Tree { len }),
        }
    }

    /// Locate the entry with `hash` whose key satisfies `eq`. `ord` steers
    /// tree descent among equal hashes when the caller holds a full key and
    /// a natural order is configured.
    pub(crate) fn find(
        &self,
        hash: u32,
        eq: &dyn Fn(&K) -> bool,
        ord: Option<&dyn Fn(&K) -> Ordering>,
    ) -> Option<NodeKey> {
        match self.buckets[self.bucket_index(hash)?] {
            Bucket::Empty => None,
            Bucket::Chain { head, .. } => {
                walk(&self.nodes, Some(head)).find(|&k| {
                    let n = &self.nodes[k];
                    n.hash == hash && eq(&n.key)
                })
            }
            Bucket::Tree { root, .. } => tree::find(&self.nodes, Some(root), hash, eq, ord),
        }
    }

    /// `find` for an owned key, using the natural order when configured.
    pub(crate) fn find_key(&self, hash: u32, key: &K) -> Option<NodeKey>
    where
        K: Eq,
    {
        let eq = |k: &K| k == key;
        match self.key_order {
            Some(cmp) => self.find(hash, &eq, Some(&|k: &K| cmp(key, k))),
            None => self.find(hash, &eq, None),
        }
    }

    /// Insert an entry known to be absent; returns its arena key.
    pub(crate) fn insert_unique(&mut self, hash: u32, key: K, value: V) -> NodeKey {
        if self.buckets.is_empty() {
            self.resize();
        }
        let i = index_for(hash, self.buckets.len());
        let x = self.nodes.insert(Node::new(hash, key, value));
        match self.buckets[i] {
            Bucket::Empty => self.buckets[i] = Bucket::Chain { head: x, len: 1 },
            Bucket::Chain { head, len } => {
                let tail = walk(&self.nodes, Some(head)).last().unwrap_or(head);
                self.nodes[tail].next = Some(x);
                self.buckets[i] = Bucket::Chain { head, len: len + 1 };
                if len + 1 >= TREEIFY_THRESHOLD {
                    self.treeify_bin(i);
                }
            }
            Bucket::Tree { root, len } => {
                let root = tree::insert(&mut self.nodes, root, x, self.key_order);
                self.buckets[i] = Bucket::Tree { root, len: len + 1 };
            }
        }
        self.mod_count += 1;
        if self.nodes.len() > self.threshold {
            self.resize();
        }
        x
    }

    /// Convert the chain at `i` into a tree, or grow the table instead
    /// while it is below `MIN_TREEIFY_CAPACITY`.
    fn treeify_bin(&mut self, i: usize) {
        if self.buckets.len() < MIN_TREEIFY_CAPACITY {
            self.resize();
            return;
        }
        if let Bucket::Chain { head, len } = self.buckets[i] {
            tree::link_prev(&mut self.nodes, head);
            let root = tree::treeify(&mut self.nodes, head, self.key_order);
            self.buckets[i] = Bucket::Tree { root, len };
            #[cfg(feature = "logging")]
            log::trace!("treeified bucket {i} holding {len} entries");
        }
    }

    /// Unlink entry `p` from its bucket and take it out of the arena.
    pub(crate) fn remove_node(&mut self, p: NodeKey) -> (K, V) {
        let i = index_for(self.nodes[p].hash, self.buckets.len());
        self.buckets[i] = match self.buckets[i] {
            Bucket::Empty => Bucket::Empty,
            Bucket::Chain { head, len } => {
                let succ = self.nodes[p].next.take();
                if head == p {
                    match succ {
                        Some(succ) => Bucket::Chain { head: succ, len: len - 1 },
                        None => Bucket::Empty,
                    }
                } else {
                    let pred = walk(&self.nodes, Some(head))
                        .find(|&k| self.nodes[k].next == Some(p))
                        .expect("removed chain entry must have a predecessor");
                    self.nodes[pred].next = succ;
                    Bucket::Chain { head, len: len - 1 }
                }
            }
            Bucket::Tree { root, len } => match tree::unlink_order(&mut self.nodes, root, p) {
                None => Bucket::Empty,
                Some(first) if len - 1 <= UNTREEIFY_THRESHOLD => {
                    tree::untreeify(&mut self.nodes, first);
                    #[cfg(feature = "logging")]
                    log::trace!("untreeified bucket {i} down to {} entries", len - 1);
                    Bucket::Chain { head: first, len: len - 1 }
                }
                Some(first) => {
                    let r = tree::remove(&mut self.nodes, root, p);
                    let root = tree::move_root_to_front(&mut self.nodes, first, r);
                    Bucket::Tree { root, len: len - 1 }
                }
            },
        };
        let node = self
            .nodes
            .remove(p)
            .expect("removed entry must be live in the arena");
        self.mod_count += 1;
        (node.key, node.value)
    }

    /// Drop every entry but keep the allocated capacity.
    pub(crate) fn clear(&mut self) {
        self.mod_count += 1;
        if !self.nodes.is_empty() {
            self.nodes.clear();
            self.buckets.iter_mut().for_each(|b| *b = Bucket::Empty);
        }
    }

    /// Size the table for `target` entries: raise the first allocation's
    /// capacity, or grow an allocated table until the threshold covers it.
    pub(crate) fn reserve_for(&mut self, target: usize) {
        if target == 0 {
            return;
        }
        if self.buckets.is_empty() {
            let ft = target as f64 / self.load_factor as f64 + 1.0;
            let t = if ft < MAXIMUM_CAPACITY as f64 {
                ft as usize
            } else {
                MAXIMUM_CAPACITY
            };
            let cap = table_size_for(t);
            if cap > self.capacity() {
                self.initial_capacity = cap;
            }
        } else {
            while target > self.threshold && self.buckets.len() < MAXIMUM_CAPACITY {
                self.resize();
            }
        }
    }

    /// Allocate the table, or double it and split every bucket in place.
    pub(crate) fn resize(&mut self) {
        let old_cap = self.buckets.len();
        let new_cap = if old_cap > 0 {
            if old_cap >= MAXIMUM_CAPACITY {
                self.threshold = usize::MAX;
                #[cfg(feature = "logging")]
                log::debug!("table at maximum capacity {old_cap}; threshold pinned");
                return;
            }
            old_cap << 1
        } else if self.initial_capacity > 0 {
            self.initial_capacity
        } else {
            DEFAULT_INITIAL_CAPACITY
        };
        self.threshold = threshold_for(new_cap, self.load_factor);
        let old = mem::replace(&mut self.buckets, vec![Bucket::Empty; new_cap]);
        for (j, b) in old.into_iter().enumerate() {
            match b {
                Bucket::Empty => {}
                Bucket::Chain { head, .. } => self.split_chain(j, head, old_cap),
                Bucket::Tree { root, .. } => self.split_tree(j, root, old_cap),
            }
        }
        self.mod_count += 1;
        #[cfg(feature = "logging")]
        log::debug!(
            "resized table from {old_cap} to {new_cap} buckets (threshold {})",
            self.threshold
        );
    }

    fn split_chain(&mut self, j: usize, head: NodeKey, bit: usize) {
        let mut lo = OrderList::new(false);
        let mut hi = OrderList::new(false);
        let mut cur = Some(head);
        while let Some(x) = cur {
            cur = self.nodes[x].next;
            if self.nodes[x].hash as usize & bit == 0 {
                lo.push(&mut self.nodes, x);
            } else {
                hi.push(&mut self.nodes, x);
            }
        }
        if let Some(head) = lo.head {
            self.buckets[j] = Bucket::Chain { head, len: lo.len };
        }
        if let Some(head) = hi.head {
            self.buckets[j + bit] = Bucket::Chain { head, len: hi.len };
        }
    }

    fn split_tree(&mut self, j: usize, root: NodeKey, bit: usize) {
        let (lo, hi) = tree::split(&mut self.nodes, root, bit as u32);
        let lo_alone = hi.head.is_none();
        let hi_alone = lo.head.is_none();
        self.buckets[j] = self.rebuild_half(lo, lo_alone);
        self.buckets[j + bit] = self.rebuild_half(hi, hi_alone);
    }

    /// A split half keeps the old tree when it took every entry, becomes a
    /// chain when small, and is otherwise treeified afresh.
    fn rebuild_half(&mut self, half: OrderList, alone: bool) -> Bucket {
        let Some(head) = half.head else {
            return Bucket::Empty;
        };
        let len = half.len;
        if len <= UNTREEIFY_THRESHOLD {
            tree::untreeify(&mut self.nodes, head);
            #[cfg(feature = "logging")]
            log::trace!("split half of {len} entries flattened to a chain");
            Bucket::Chain { head, len }
        } else if alone {
            Bucket::Tree { root: head, len }
        } else {
            let root = tree::treeify(&mut self.nodes, head, self.key_order);
            Bucket::Tree { root, len }
        }
    }

    pub(crate) fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let cap = self.buckets.len();
        if cap == 0 {
            if self.nodes.is_empty() {
                return Ok(());
            }
            return Err(InvariantViolation::OccupancyMismatch {
                len: self.nodes.len(),
                actual: 0,
            });
        }
        if !cap.is_power_of_two() {
            return Err(InvariantViolation::CapacityNotPowerOfTwo(cap));
        }
        let expected = if cap >= MAXIMUM_CAPACITY {
            self.threshold
        } else {
            threshold_for(cap, self.load_factor)
        };
        if self.threshold != expected {
            return Err(InvariantViolation::ThresholdMismatch {
                expected,
                actual: self.threshold,
            });
        }
        if self.nodes.len() > self.threshold {
            return Err(InvariantViolation::OccupancyAboveThreshold {
                len: self.nodes.len(),
                threshold: self.threshold,
            });
        }

        let mut total = 0;
        for (bucket, b) in self.buckets.iter().enumerate() {
            let actual = match *b {
                Bucket::Empty => 0,
                Bucket::Chain { head, .. } => {
                    let mut n = 0;
                    for k in walk(&self.nodes, Some(head)) {
                        if self.nodes[k].tree != TreeLinks::default() {
                            return Err(InvariantViolation::ChainWithTreeLinks { bucket });
                        }
                        n += 1;
                    }
                    n
                }
                Bucket::Tree { root, len } => {
                    if len <= UNTREEIFY_THRESHOLD {
                        return Err(InvariantViolation::UndersizedTree { bucket, len });
                    }
                    tree::check(&self.nodes, bucket, root)?
                }
            };
            if actual != b.len() {
                return Err(InvariantViolation::LengthMismatch {
                    bucket,
                    recorded: b.len(),
                    actual,
                });
            }
            for k in walk(&self.nodes, b.head()) {
                let hash = self.nodes[k].hash;
                if index_for(hash, cap) != bucket {
                    return Err(InvariantViolation::MisplacedEntry { bucket, hash });
                }
            }
            total += actual;
        }
        if total != self.nodes.len() {
            return Err(InvariantViolation::OccupancyMismatch {
                len: self.nodes.len(),
                actual: total,
            });
        }
        Ok(())
    }
}

impl<K: Clone, V: Clone> Clone for RawTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, atomic::Ordering::Relaxed),
            buckets: self.buckets.clone(),
            nodes: self.nodes.clone(),
            threshold: self.threshold,
            initial_capacity: self.initial_capacity,
            load_factor: self.load_factor,
            mod_count: self.mod_count,
            key_order: self.key_order,
        }
    }
}

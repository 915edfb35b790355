//! hybrid-hashmap: a hash map whose buckets are collision chains that turn
//! into red-black trees when they get long, so that many keys with equal
//! hashes cost O(log n) per lookup instead of O(n).
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the average-case speed of separate chaining while bounding
//!   the worst case inside any single bucket.
//! - Layers:
//!   - `hash`: folds a key's 64-bit hash to 32 bits and spreads the high
//!     half into the low half (`h ^ h >> 16`); the slot is `h & (cap - 1)`.
//!   - `node`: every entry lives in one `slotmap` arena; buckets link
//!     entries by stable `NodeKey`s, never by owning pointers.
//!   - `tree`: red-black algorithms (rotations, insert/delete fix-up,
//!     treeify/untreeify, split) over those keys. Each function takes the
//!     current root and returns the new one.
//!   - `table`: the power-of-two slot array, occupancy, threshold and
//!     modification counter. Owns growth and chain/tree promotion.
//!   - `HybridHashMap<K, V, S>`: public API. Hashes keys, delegates to the
//!     table, and is the only layer that calls `K: Hash`.
//!
//! Bucket states
//! - Empty → Chain(1) → Chain(n) → Tree once a chain reaches 8 entries and
//!   the table has at least 64 slots; below 64 slots the table doubles
//!   instead. A tree becomes a chain again at 6 entries or fewer, whether
//!   by removal or by a split during growth.
//! - A tree bucket's entries also form a doubly linked list whose head is
//!   the tree root; the slot stores that one key for both.
//!
//! Growth
//! - The table doubles when occupancy exceeds `⌊capacity × load factor⌋`.
//!   Each bucket splits on the bit `hash & old_capacity` into the same
//!   slot or `slot + old_capacity`, preserving relative order. The table
//!   stops at 2^30 slots and the threshold is then pinned at `usize::MAX`.
//!
//! Tie-break order
//! - Inside a tree, entries order by hash, then by an optional key order,
//!   then by arena identity. The key order is a type parameter of the map
//!   (`Unordered`, `Natural` or `ByFn`) chosen on the builder. With
//!   `Natural`, lookups by any borrowed `Q: Ord` descend a single path;
//!   with `Unordered` they search both subtrees of a hash-equal node when
//!   needed.
//!
//! Fail-fast traversal
//! - Borrowing iterators are protected by the borrow checker. The detached
//!   [`Cursor`] instead snapshots a modification counter (bumped on insert,
//!   remove, clear and growth, never on value replacement) and fails with
//!   [`CursorError::ConcurrentModification`] once it changes.
//!
//! Notes and non-goals
//! - Not thread-safe; wrap in a lock for shared use.
//! - No ordering guarantee beyond table-then-bucket order.
//! - Persistence exposes a header and entries; I/O belongs to the caller
//!   (or to `serde` with the `serde` feature). Pre-sizing from a recorded
//!   occupancy is capped at a fixed memory budget.
//!
//! Optional features
//! - `logging`: `log` records on growth and bucket representation changes.
//! - `serde`: `Serialize`/`Deserialize` following the persisted layout.

mod builder;
mod cursor;
pub mod error;
mod hash;
pub mod iter;
mod map;
mod map_proptest;
mod node;
mod order;
mod persist;
mod table;
mod tree;

// Public surface
pub use builder::HybridHashMapBuilder;
pub use cursor::Cursor;
pub use error::{ConfigError, CursorError, InvariantViolation};
pub use map::HybridHashMap;
pub use order::{ByFn, LookupTieBreak, Natural, TieBreak, Unordered};
pub use persist::PersistedHeader;
pub use table::BucketKind;

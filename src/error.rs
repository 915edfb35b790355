//! Error types.

/// Rejected map configuration.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The load factor must be a positive number.
    #[error("illegal load factor: {0}")]
    IllegalLoadFactor(f32),
}

/// Failure of a [`Cursor`][crate::Cursor] step.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    /// The map was structurally modified (insert, remove, clear or resize)
    /// since the cursor was created or last removed an entry through itself.
    /// The traversal cannot continue; start a new cursor.
    #[error("map was structurally modified during traversal")]
    ConcurrentModification,

    /// `remove` was called before `next` yielded an entry, or twice for the
    /// same entry.
    #[error("cursor is not positioned on an entry")]
    NoCurrentEntry,

    /// The cursor was handed a map other than the one that created it.
    #[error("cursor belongs to a different map")]
    ForeignMap,
}

/// A broken structural invariant, reported by
/// [`HybridHashMap::check_invariants`][crate::HybridHashMap::check_invariants].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("table capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),

    #[error("threshold {actual} does not match capacity x load factor ({expected})")]
    ThresholdMismatch { expected: usize, actual: usize },

    #[error("occupancy {len} exceeds threshold {threshold}")]
    OccupancyAboveThreshold { len: usize, threshold: usize },

    #[error("bucket {bucket}: recorded {recorded} entries, found {actual}")]
    LengthMismatch {
        bucket: usize,
        recorded: usize,
        actual: usize,
    },

    #[error("total of bucket lengths {actual} differs from occupancy {len}")]
    OccupancyMismatch { len: usize, actual: usize },

    #[error("bucket {bucket}: entry with hash {hash:#x} belongs elsewhere")]
    MisplacedEntry { bucket: usize, hash: u32 },

    #[error("bucket {bucket}: chain entry carries tree links")]
    ChainWithTreeLinks { bucket: usize },

    #[error("bucket {bucket}: tree holds only {len} entries")]
    UndersizedTree { bucket: usize, len: usize },

    #[error("bucket {bucket}: tree root is not black or has a parent")]
    BadRoot { bucket: usize },

    #[error("bucket {bucket}: parent/child or prev/next links are not symmetric")]
    LinkAsymmetry { bucket: usize },

    #[error("bucket {bucket}: in-order hashes are not non-decreasing")]
    OrderViolation { bucket: usize },

    #[error("bucket {bucket}: red node with a red child")]
    RedRed { bucket: usize },

    #[error("bucket {bucket}: unequal black height")]
    BlackHeight { bucket: usize },

    #[error("bucket {bucket}: tree and order list hold different entries")]
    TreeListMismatch { bucket: usize },
}

//! Hash/index mapping: spreads a key's raw hash and maps it onto a table slot.

use core::hash::{BuildHasher, Hash};

use crate::table::MAXIMUM_CAPACITY;

/// Hash `q` with `hasher` and fold the result into the 32-bit spread hash
/// stored in every entry.
#[inline]
pub(crate) fn make_hash<S, Q>(hasher: &S, q: &Q) -> u32
where
    S: BuildHasher,
    Q: ?Sized + Hash,
{
    let raw = hasher.hash_one(q);
    spread((raw ^ (raw >> 32)) as u32)
}

/// XOR the high half of the hash into the low half so that masking with a
/// small capacity still sees the upper bits.
#[inline]
pub(crate) const fn spread(h: u32) -> u32 {
    h ^ (h >> 16)
}

/// Slot for `hash` in a table of `capacity` buckets (a power of two).
#[inline]
pub(crate) const fn index_for(hash: u32, capacity: usize) -> usize {
    hash as usize & (capacity - 1)
}

/// Smallest power of two `>= cap`, clamped to `[1, MAXIMUM_CAPACITY]`.
pub(crate) fn table_size_for(cap: usize) -> usize {
    if cap >= MAXIMUM_CAPACITY {
        return MAXIMUM_CAPACITY;
    }
    cap.max(1).next_power_of_two()
}

/// `⌊capacity × load_factor⌋`, or `usize::MAX` once either side reaches the ceiling.
pub(crate) fn threshold_for(capacity: usize, load_factor: f32) -> usize {
    let ft = capacity as f64 * load_factor as f64;
    if capacity < MAXIMUM_CAPACITY && ft < MAXIMUM_CAPACITY as f64 {
        ft as usize
    } else {
        usize::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_folds_high_bits() {
        assert_eq!(spread(0), 0);
        assert_eq!(spread(0x0001_0000), 0x0001_0001);
        assert_eq!(spread(0xffff_0000), 0xffff_ffff);
        // Values below 2^16 are unchanged.
        assert_eq!(spread(0x1234), 0x1234);
    }

    #[test]
    fn index_masks_low_bits() {
        assert_eq!(index_for(17, 16), 1);
        assert_eq!(index_for(31, 16), 15);
        assert_eq!(index_for(u32::MAX, 64), 63);
        assert_eq!(index_for(5, 1), 0);
    }

    #[test]
    fn table_size_rounds_up_to_power_of_two() {
        assert_eq!(table_size_for(0), 1);
        assert_eq!(table_size_for(1), 1);
        assert_eq!(table_size_for(10), 16);
        assert_eq!(table_size_for(16), 16);
        assert_eq!(table_size_for(17), 32);
        assert_eq!(table_size_for(MAXIMUM_CAPACITY + 1), MAXIMUM_CAPACITY);
        assert_eq!(table_size_for(usize::MAX), MAXIMUM_CAPACITY);
    }

    #[test]
    fn threshold_floors_and_pins_at_ceiling() {
        assert_eq!(threshold_for(16, 0.75), 12);
        assert_eq!(threshold_for(1, 0.75), 0);
        assert_eq!(threshold_for(16, 0.3), 4);
        assert_eq!(threshold_for(MAXIMUM_CAPACITY, 0.75), usize::MAX);
        assert_eq!(threshold_for(1 << 29, 4.0), usize::MAX);
    }

    #[test]
    fn make_hash_is_deterministic_for_a_given_builder() {
        let s = hashbrown::hash_map::DefaultHashBuilder::default();
        assert_eq!(make_hash(&s, "abc"), make_hash(&s, "abc"));
        assert_eq!(make_hash(&s, &7u64), make_hash(&s, &7u64));
    }
}

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use rand::{rngs::StdRng, SeedableRng};

/// Scale for fixed-point accumulation of conductance contributions.
pub const FIXED_POINT_FACTOR: f32 = (1u64 << 24) as f32;

pub fn get_partition_range(
    num_threads: usize,
    thread_id: usize,
    num_elements: usize,
) -> Range<usize> {
    let min_partition_size = num_elements / num_threads;
    let remainder = num_elements % num_threads;

    if thread_id < remainder {
        let partition_size = min_partition_size + 1;
        let start = partition_size * thread_id;
        let end = start + partition_size;
        Range { start, end }
    } else {
        let start =
            (min_partition_size + 1) * remainder + min_partition_size * (thread_id - remainder);
        let end = start + min_partition_size;
        Range { start, end }
    }
}

/// Splits `ranges`, which must tile `0..slice.len()` in ascending order, into disjoint
/// mutable sub-slices.
pub fn split_by_ranges<'a, T>(
    mut slice: &'a mut [T],
    ranges: &[Range<usize>],
) -> Vec<&'a mut [T]> {
    let mut result = Vec::with_capacity(ranges.len());
    let mut offset = 0;

    for range in ranges {
        let (head, tail) = slice.split_at_mut(range.end - offset);
        result.push(&mut head[(range.start - offset)..]);
        slice = tail;
        offset = range.end;
    }

    result
}

pub fn calculate_hash<T: Hash>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

pub fn seeded_rng<T: Hash>(key: &T) -> StdRng {
    StdRng::seed_from_u64(calculate_hash(key))
}

/// Counter-based uniform number in [0, 1), a pure function of its key.
pub fn counter_rand<T: Hash>(key: &T) -> f32 {
    (calculate_hash(key) >> 40) as f32 / (1u64 << 24) as f32
}

pub fn to_fixed(val: f32) -> i64 {
    (val * FIXED_POINT_FACTOR).round() as i64
}

pub fn from_fixed(val: i64) -> f32 {
    (val as f64 / FIXED_POINT_FACTOR as f64) as f32
}

#[cfg(test)]
pub mod test_util {
    use float_cmp::{assert_approx_eq, ApproxEq};
    use std::fmt::Debug;

    pub fn assert_approx_eq_slice<T>(left: &[T], right: &[T])
    where
        T: ApproxEq + Debug + Copy,
    {
        assert_eq!(left.len(), right.len());

        for item in left.iter().zip(right) {
            assert_approx_eq!(T, *item.0, *item.1);
        }
    }
}

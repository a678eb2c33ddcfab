//! Oblivious shuffle (§4.2): a uniformly random permutation of a table
//! whose *sequence of memory accesses* depends only on the table's size,
//! not on the randomness drawn or the tuples' content.
//!
//! Grounded in `oshuffle.hpp`'s OrShuffle/Waksman-network family, but
//! realized here as a random-tag sort: every row draws a fresh random key
//! into `alignment_key` from the supplied CSPRNG, then the table is routed
//! through the same fixed bitonic network every other sort in this crate
//! uses. The network's access pattern is already data-independent; the
//! randomness lives entirely in the tag values it compares, not in which
//! comparisons happen.

use rand_core::RngCore;

use super::bitonic::bitonic_sort;
use crate::tuple::Tuple;

fn sign(d: i64) -> i32 {
    if d > 0 {
        1
    } else if d < 0 {
        -1
    } else {
        0
    }
}

fn cmp_shuffle_tag(a: &Tuple, b: &Tuple) -> i32 {
    sign(a.alignment_key - b.alignment_key)
}

/// Overwrites every row's `alignment_key` with a fresh random tag drawn
/// from `rng` and sorts by it, yielding a uniformly random permutation
/// (up to tag collisions, negligible at 64 bits of randomness per row).
/// Clobbers `alignment_key`, matching `oblivious_compact`'s convention of
/// consuming a scratch field as its working key.
pub fn oblivious_shuffle<R: RngCore>(data: &mut Vec<Tuple>, rng: &mut R) {
    for t in data.iter_mut() {
        t.alignment_key = rng.next_u64() as i64;
    }
    bitonic_sort(data, cmp_shuffle_tag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::MAX_ATTRIBUTES;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn shuffle_is_a_permutation_of_the_input() {
        let mut data: Vec<Tuple> = (0..32)
            .map(|i| Tuple::new_source(i, [0; MAX_ATTRIBUTES]))
            .collect();
        let mut before: Vec<u32> = data.iter().map(|t| t.original_index).collect();
        before.sort_unstable();

        let mut rng = StdRng::seed_from_u64(42);
        oblivious_shuffle(&mut data, &mut rng);

        let mut after: Vec<u32> = data.iter().map(|t| t.original_index).collect();
        after.sort_unstable();
        assert_eq!(before, after);
    }

    #[test]
    fn shuffle_actually_moves_rows_for_a_nontrivial_size() {
        let mut data: Vec<Tuple> = (0..64)
            .map(|i| Tuple::new_source(i, [0; MAX_ATTRIBUTES]))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        oblivious_shuffle(&mut data, &mut rng);
        let identity = data.iter().enumerate().all(|(i, t)| t.original_index == i as u32);
        assert!(!identity, "shuffling 64 rows landed on the identity permutation");
    }
}

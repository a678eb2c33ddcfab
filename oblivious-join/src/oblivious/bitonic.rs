//! Bitonic sorting network (§4.2): sorts any size up to batch capacity with
//! a data-independent sequence of compare-and-swaps. Sizes above capacity
//! are handled by the external sort (`sort::external`), which sorts runs of
//! this size internally and merges them with a non-oblivious heap merge.

use super::cas::{oblivious_cas, CompareFn};
use crate::tuple::{FieldType, Tuple, JOIN_ATTR_SORT_PADDING, MAX_ATTRIBUTES, ORIGINAL_INDEX_SORT_PADDING};

fn next_power_of_two(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        n.next_power_of_two()
    }
}

fn sort_padding_tuple() -> Tuple {
    let mut t = Tuple::new_source(ORIGINAL_INDEX_SORT_PADDING, [0; MAX_ATTRIBUTES]);
    t.field_type = FieldType::SortPadding;
    t.join_attr = JOIN_ATTR_SORT_PADDING;
    t
}

fn two_mut(data: &mut [Tuple], i: usize, l: usize) -> (&mut Tuple, &mut Tuple) {
    debug_assert!(i < l);
    let (left, right) = data.split_at_mut(l);
    (&mut left[i], &mut right[0])
}

/// Sorts `data` by `cmp` using a bitonic network, padding to the next power
/// of two with SORT_PADDING rows (which the padding tie-break always routes
/// to the tail) and truncating back to the original length afterward.
pub fn bitonic_sort(data: &mut Vec<Tuple>, cmp: CompareFn) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    let padded_n = next_power_of_two(n);
    data.resize(padded_n, sort_padding_tuple());

    let mut k = 2;
    while k <= padded_n {
        let mut j = k / 2;
        while j > 0 {
            for i in 0..padded_n {
                let l = i ^ j;
                if l > i {
                    let ascending = i & k == 0;
                    let (a, b) = two_mut(data.as_mut_slice(), i, l);
                    if ascending {
                        oblivious_cas(a, b, cmp);
                    } else {
                        oblivious_cas(b, a, cmp);
                    }
                }
            }
            j /= 2;
        }
        k *= 2;
    }

    data.truncate(n);
}

//! Compare-and-swap: an arithmetic comparator sign, a padding tie-break, and
//! a conditional swap realize the in-place CAS every comparator kind (§4.3a)
//! is built from.

use super::select_swap::cond_swap;
use crate::tuple::Tuple;

/// A pure comparator: negative if `a` should sort before `b`, positive if
/// after, zero if equal under this ordering.
pub type CompareFn = fn(&Tuple, &Tuple) -> i32;

/// Forces SORT_PADDING to the larger side regardless of what the raw
/// comparator said, without branching on which operand (if either) is
/// padding: both padding flags are folded into the returned sign
/// arithmetically.
fn adjust_for_padding(a: &Tuple, b: &Tuple, raw_sign: i32) -> i32 {
    let a_pad = a.is_sort_padding() as i32;
    let b_pad = b.is_sort_padding() as i32;
    // a_pad - b_pad is +1 when only a is padding (a must sort larger),
    // -1 when only b is padding (a must sort smaller), 0 when the padding
    // status agrees and the raw comparator's answer stands.
    let pad_sign = a_pad - b_pad;
    let use_pad = (pad_sign != 0) as i32;
    pad_sign * use_pad + raw_sign * (1 - use_pad)
}

/// Runs `cmp(a, b)`, applies the padding tie-break, and conditionally swaps
/// the pair when the adjusted sign is positive (`a` should come after `b`).
pub fn oblivious_cas(a: &mut Tuple, b: &mut Tuple, cmp: CompareFn) {
    let raw = cmp(a, b);
    let adjusted = adjust_for_padding(a, b, raw);
    cond_swap(a, b, adjusted > 0);
}

/// The DISTRIBUTE comparator of §4.6 step 6 / DESIGN.md's O1: swaps the
/// *entire* tuple — `index` included — whenever `a.dst_idx >= b.index` and
/// `a` is not DIST_PADDING, then unconditionally restores both operands'
/// `index` fields to their pre-swap values. This exact ordering (full swap,
/// then stomp `index` back) rather than "swap all fields except index" is
/// required for the variable-stride distribution network to converge; see
/// DESIGN.md.
pub fn oblivious_cas_distribute(a: &mut Tuple, b: &mut Tuple) {
    let should_swap = a.dst_idx >= b.index && !a.is_dist_padding();
    let a_index = a.index;
    let b_index = b.index;
    cond_swap(a, b, should_swap);
    a.index = a_index;
    b.index = b_index;
}

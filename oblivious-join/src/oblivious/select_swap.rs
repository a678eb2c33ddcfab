//! Conditional select and conditional swap, the base case every other
//! oblivious primitive in this crate is built from.

use crate::tuple::{EqualityType, FieldType, Tuple};

/// `(a & !m) | (b & m)` with `m` the all-ones or all-zero mask of `choice`.
/// Returns `b` when `choice` is true, `a` otherwise, without branching on
/// `choice`.
#[inline]
pub fn cond_select_i64(a: i64, b: i64, choice: bool) -> i64 {
    let m = -(choice as i64);
    (a & !m) | (b & m)
}

#[inline]
fn mask_of(choice: bool) -> i64 {
    -(choice as i64)
}

/// XOR-swaps two `i64` words under `mask`: swaps when `mask == -1`, leaves
/// both untouched when `mask == 0`. Both words are written in either case.
#[inline]
fn cond_swap_i64(a: &mut i64, b: &mut i64, mask: i64) {
    let x = (*a ^ *b) & mask;
    *a ^= x;
    *b ^= x;
}

#[inline]
fn cond_swap_u32(a: &mut u32, b: &mut u32, mask: i64) {
    let m = mask as u32;
    let x = (*a ^ *b) & m;
    *a ^= x;
    *b ^= x;
}

#[inline]
fn cond_swap_u64(a: &mut u64, b: &mut u64, mask: i64) {
    let m = mask as u64;
    let x = (*a ^ *b) & m;
    *a ^= x;
    *b ^= x;
}

#[inline]
fn cond_swap_bool(a: &mut bool, b: &mut bool, mask: i64) {
    let mut av = *a as u8 as i64;
    let mut bv = *b as u8 as i64;
    cond_swap_i64(&mut av, &mut bv, mask);
    *a = av != 0;
    *b = bv != 0;
}

/// Unconditionally swaps every field of `a` and `b` when `choice` is true,
/// and writes back identical values (a true no-op, not merely "doesn't
/// swap") when `choice` is false. Every byte of both tuples is touched in
/// both cases: this is the property the rest of the crate relies on to
/// claim the primitive is oblivious.
pub fn cond_swap(a: &mut Tuple, b: &mut Tuple, choice: bool) {
    let mask = mask_of(choice);

    let mut ft_a = a.field_type as u8 as i64;
    let mut ft_b = b.field_type as u8 as i64;
    cond_swap_i64(&mut ft_a, &mut ft_b, mask);
    a.field_type = FieldType::from_u8(ft_a as u8);
    b.field_type = FieldType::from_u8(ft_b as u8);

    let mut eq_a = a.equality_type as u8 as i64;
    let mut eq_b = b.equality_type as u8 as i64;
    cond_swap_i64(&mut eq_a, &mut eq_b, mask);
    a.equality_type = EqualityType::from_u8(eq_a as u8);
    b.equality_type = EqualityType::from_u8(eq_b as u8);

    let mut ja_a = a.join_attr as i64;
    let mut ja_b = b.join_attr as i64;
    cond_swap_i64(&mut ja_a, &mut ja_b, mask);
    a.join_attr = ja_a as i32;
    b.join_attr = ja_b as i32;

    cond_swap_u32(&mut a.original_index, &mut b.original_index, mask);

    cond_swap_i64(&mut a.local_mult, &mut b.local_mult, mask);
    cond_swap_i64(&mut a.final_mult, &mut b.final_mult, mask);
    cond_swap_i64(&mut a.foreign_sum, &mut b.foreign_sum, mask);
    cond_swap_i64(&mut a.local_cumsum, &mut b.local_cumsum, mask);
    cond_swap_i64(&mut a.local_interval, &mut b.local_interval, mask);
    cond_swap_i64(&mut a.foreign_interval, &mut b.foreign_interval, mask);
    cond_swap_i64(&mut a.local_weight, &mut b.local_weight, mask);
    cond_swap_i64(&mut a.copy_index, &mut b.copy_index, mask);
    cond_swap_i64(&mut a.alignment_key, &mut b.alignment_key, mask);
    cond_swap_i64(&mut a.dst_idx, &mut b.dst_idx, mask);
    cond_swap_i64(&mut a.index, &mut b.index, mask);

    for k in 0..a.attributes.len() {
        cond_swap_i64(&mut a.attributes[k], &mut b.attributes[k], mask);
    }

    cond_swap_bool(&mut a.is_encrypted, &mut b.is_encrypted, mask);
    cond_swap_u64(&mut a.nonce, &mut b.nonce, mask);
}

/// Overwrites every field of `dst` with the corresponding field of `src`
/// when `choice` is true, and with its own existing value otherwise. Every
/// field is written in both cases.
pub fn cond_assign(dst: &mut Tuple, src: &Tuple, choice: bool) {
    let mask = choice;
    dst.field_type = FieldType::from_u8(cond_select_i64(
        dst.field_type as u8 as i64,
        src.field_type as u8 as i64,
        mask,
    ) as u8);
    dst.equality_type = EqualityType::from_u8(cond_select_i64(
        dst.equality_type as u8 as i64,
        src.equality_type as u8 as i64,
        mask,
    ) as u8);
    dst.join_attr = cond_select_i64(dst.join_attr as i64, src.join_attr as i64, mask) as i32;
    dst.original_index =
        cond_select_i64(dst.original_index as i64, src.original_index as i64, mask) as u32;
    dst.local_mult = cond_select_i64(dst.local_mult, src.local_mult, mask);
    dst.final_mult = cond_select_i64(dst.final_mult, src.final_mult, mask);
    dst.foreign_sum = cond_select_i64(dst.foreign_sum, src.foreign_sum, mask);
    dst.local_cumsum = cond_select_i64(dst.local_cumsum, src.local_cumsum, mask);
    dst.local_interval = cond_select_i64(dst.local_interval, src.local_interval, mask);
    dst.foreign_interval = cond_select_i64(dst.foreign_interval, src.foreign_interval, mask);
    dst.local_weight = cond_select_i64(dst.local_weight, src.local_weight, mask);
    dst.copy_index = cond_select_i64(dst.copy_index, src.copy_index, mask);
    dst.alignment_key = cond_select_i64(dst.alignment_key, src.alignment_key, mask);
    dst.dst_idx = cond_select_i64(dst.dst_idx, src.dst_idx, mask);
    dst.index = cond_select_i64(dst.index, src.index, mask);
    for k in 0..dst.attributes.len() {
        dst.attributes[k] = cond_select_i64(dst.attributes[k], src.attributes[k], mask);
    }
    dst.is_encrypted = cond_select_i64(dst.is_encrypted as i64, src.is_encrypted as i64, mask) != 0;
    dst.nonce = cond_select_i64(dst.nonce as i64, src.nonce as i64, mask) as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_picks_b_when_true() {
        assert_eq!(cond_select_i64(10, 20, true), 20);
        assert_eq!(cond_select_i64(10, 20, false), 10);
    }

    #[test]
    fn swap_exchanges_when_true() {
        let mut a = Tuple::new_source(0, [1; crate::tuple::MAX_ATTRIBUTES]);
        let mut b = Tuple::new_source(1, [2; crate::tuple::MAX_ATTRIBUTES]);
        cond_swap(&mut a, &mut b, true);
        assert_eq!(a.original_index, 1);
        assert_eq!(b.original_index, 0);
        assert_eq!(a.attributes[0], 2);
        assert_eq!(b.attributes[0], 1);
    }

    #[test]
    fn swap_leaves_in_place_when_false() {
        let mut a = Tuple::new_source(0, [1; crate::tuple::MAX_ATTRIBUTES]);
        let mut b = Tuple::new_source(1, [2; crate::tuple::MAX_ATTRIBUTES]);
        cond_swap(&mut a, &mut b, false);
        assert_eq!(a.original_index, 0);
        assert_eq!(b.original_index, 1);
    }
}

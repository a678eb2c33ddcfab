//! Dispatcher families (d) and (e): unary transform operators and the
//! join-attribute set/init operators. Grounded in
//! `impl/src/enclave/core/transform_functions.c`.

use crate::error::JoinError;
use crate::oblivious::cond_select_i64;
use crate::tuple::{
    EqualityType, FieldType, Tuple, JOIN_ATTR_SORT_PADDING, ORIGINAL_INDEX_SORT_PADDING,
};

/// Zeroes every scratch field (the ones reused across phases), leaving the
/// persistent fields (`local_mult`, `final_mult`, `foreign_sum`) untouched.
pub fn zero_scratch(t: &mut Tuple) {
    t.local_cumsum = 0;
    t.local_interval = 0;
    t.foreign_interval = 0;
    t.local_weight = 0;
    t.copy_index = 0;
    t.alignment_key = 0;
    t.dst_idx = 0;
    t.index = 0;
}

/// Resets a freshly-ingested tuple's full metadata surface (persistent and
/// scratch) to a null baseline, leaving only its payload attributes.
/// Used once, at ingestion, to build an augmented tuple out of a raw input
/// row.
pub fn init_metadata(t: &mut Tuple) {
    t.field_type = FieldType::Source;
    t.equality_type = EqualityType::None;
    t.join_attr = 0;
    t.original_index = 0;
    t.local_mult = 0;
    t.final_mult = 0;
    t.foreign_sum = 0;
    zero_scratch(t);
    t.is_encrypted = false;
    t.nonce = 0;
}

/// Marks `t` as SORT_PADDING, setting `join_attr`/`original_index` to their
/// declared sentinels (not `INT32_MAX`/`UINT32_MAX`: see DESIGN.md's O2
/// note).
pub fn mark_sort_padding(t: &mut Tuple) {
    t.field_type = FieldType::SortPadding;
    t.join_attr = JOIN_ATTR_SORT_PADDING;
    t.original_index = ORIGINAL_INDEX_SORT_PADDING;
}

/// Marks `t` as DIST_PADDING.
pub fn mark_dist_padding(t: &mut Tuple) {
    t.field_type = FieldType::DistPadding;
}

/// Marks `t` as DIST_PADDING iff its `final_mult` is zero (§4.6 step 3).
/// Applied to every row of a table unconditionally, so the access pattern
/// stays independent of which rows actually match.
pub fn mark_dist_padding_if_empty(t: &mut Tuple) {
    if t.final_mult == 0 {
        mark_dist_padding(t);
    }
}

/// `t.local_mult = 1`.
pub fn set_local_mult_one(t: &mut Tuple) {
    t.local_mult = 1;
}

/// `t.field_type = SOURCE`, used when a parent's row is folded into a
/// combined table as the child-table's contribution.
pub fn to_source(t: &mut Tuple) {
    t.field_type = FieldType::Source;
    t.equality_type = EqualityType::None;
}

/// Converts `t` into a START boundary at `join_attr + delta`, recording
/// `equality_type`. The only operator (besides `to_end`) allowed to stretch
/// `join_attr` past its ordinary valid range; rejects a `t` whose
/// `join_attr` already sits in the sentinel neighborhood, and rejects a
/// result that would cross into one.
pub fn to_start(t: &mut Tuple, delta: i32, eq: EqualityType) -> Result<(), JoinError> {
    stretch(t, delta, FieldType::Start, eq)
}

/// As `to_start`, producing an END boundary.
pub fn to_end(t: &mut Tuple, delta: i32, eq: EqualityType) -> Result<(), JoinError> {
    stretch(t, delta, FieldType::End, eq)
}

fn stretch(t: &mut Tuple, delta: i32, field_type: FieldType, eq: EqualityType) -> Result<(), JoinError> {
    if t.in_sentinel_neighborhood() {
        return Err(JoinError::InvariantViolated(
            "join_attr already in sentinel neighborhood before boundary stretch".into(),
        ));
    }
    let stretched = t.join_attr as i64 + delta as i64;
    if stretched <= crate::tuple::JOIN_ATTR_NEG_INF as i64
        || stretched >= crate::tuple::JOIN_ATTR_POS_INF as i64
    {
        return Err(JoinError::InvariantViolated(
            "boundary deviation pushed join_attr into the sentinel neighborhood".into(),
        ));
    }
    t.field_type = field_type;
    t.equality_type = eq;
    t.join_attr = stretched as i32;
    Ok(())
}

/// `t.local_cumsum = t.local_mult; t.local_interval = 0`, the baseline a
/// combined table needs before Phase 1's JOIN_ATTR-sorted linear pass
/// (§4.4 step 2).
pub fn init_local_window(t: &mut Tuple) {
    t.local_cumsum = t.local_mult;
    t.local_interval = 0;
}

/// `t.local_weight = t.local_mult; t.foreign_sum = 0; t.foreign_interval =
/// 0`, the baseline a combined table needs before Phase 2's JOIN_ATTR-sorted
/// linear pass (§4.5 step 1).
pub fn init_foreign_window(t: &mut Tuple) {
    t.local_weight = t.local_mult;
    t.foreign_sum = 0;
    t.foreign_interval = 0;
}

/// `t.dst_idx = 0; t.index = 0`, the baseline for Phase 3's prefix-sum
/// linear pass (§4.6 step 1).
pub fn init_dst_idx_and_index(t: &mut Tuple) {
    t.dst_idx = 0;
    t.index = 0;
}

/// `t.index = 0` alone, leaving `dst_idx` untouched — Phase 3 step 5 needs
/// to renumber `index` after padding without disturbing the prefix sums
/// computed into `dst_idx` back in step 1, which step 6's distribution
/// network still reads.
pub fn init_index_only(t: &mut Tuple) {
    t.index = 0;
}

/// `t.final_mult = t.local_mult`, used to seed the root before Phase 2.
pub fn init_final_mult_from_local(t: &mut Tuple) {
    t.final_mult = t.local_mult;
}

/// `t.alignment_key = t.foreign_sum + t.copy_index / t.local_mult`
/// (integer division), the per-row alignment key of §4.7 step 2. The
/// divisor is replaced by 1 when `local_mult` is zero (a row that cannot
/// have survived Phase 3's expansion, guarded anyway rather than left to
/// panic).
pub fn compute_alignment_key(t: &mut Tuple) {
    let safe_denom = cond_select_i64(t.local_mult, 1, t.local_mult == 0);
    t.alignment_key = t.foreign_sum + t.copy_index / safe_denom;
}

/// Family (e): copies payload attribute `attr_index` into `join_attr` and
/// nulls out the rest of the metadata surface via a bitmask-style reset
/// (every field is written, not conditionally skipped).
pub fn set_join_attr_from_attribute(t: &mut Tuple, attr_index: usize) -> Result<(), JoinError> {
    if attr_index >= t.attributes.len() {
        return Err(JoinError::InvalidArgument(format!(
            "attribute index {attr_index} out of range"
        )));
    }
    let value = t.attributes[attr_index];
    if value < crate::tuple::JOIN_ATTR_MIN as i64 || value > crate::tuple::JOIN_ATTR_MAX as i64 {
        return Err(JoinError::InvalidArgument(format!(
            "join attribute value {value} outside the valid join_attr domain"
        )));
    }
    t.join_attr = value as i32;
    t.equality_type = EqualityType::None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::MAX_ATTRIBUTES;

    #[test]
    fn to_start_stretches_join_attr_by_delta() {
        let mut t = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        t.join_attr = 10;
        to_start(&mut t, -2, EqualityType::Eq).unwrap();
        assert_eq!(t.join_attr, 8);
        assert!(t.is_start());
        assert_eq!(t.equality_type, EqualityType::Eq);
    }

    #[test]
    fn to_start_rejects_sentinel_neighborhood_input() {
        let mut t = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        t.join_attr = crate::tuple::JOIN_ATTR_NEG_INF;
        assert!(to_start(&mut t, 1, EqualityType::Eq).is_err());
    }

    #[test]
    fn to_end_rejects_a_deviation_that_crosses_into_infinity() {
        let mut t = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        t.join_attr = crate::tuple::JOIN_ATTR_MAX;
        let huge_delta = i32::MAX;
        assert!(to_end(&mut t, huge_delta, EqualityType::Eq).is_err());
    }

    #[test]
    fn mark_sort_padding_uses_declared_sentinels_not_integer_extremes() {
        let mut t = Tuple::new_source(3, [0; MAX_ATTRIBUTES]);
        mark_sort_padding(&mut t);
        assert_eq!(t.join_attr, JOIN_ATTR_SORT_PADDING);
        assert_ne!(t.join_attr, i32::MAX);
        assert_eq!(t.original_index, ORIGINAL_INDEX_SORT_PADDING);
    }

    #[test]
    fn alignment_key_groups_consecutive_copies_into_the_same_parent_bucket() {
        let mut t = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        t.foreign_sum = 10;
        t.local_mult = 3;
        t.copy_index = 4;
        compute_alignment_key(&mut t);
        // copies 0,1,2 -> bucket 10; copies 3,4,5 -> bucket 11.
        assert_eq!(t.alignment_key, 11);
    }

    #[test]
    fn alignment_key_guards_against_zero_local_mult() {
        let mut t = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        t.foreign_sum = 5;
        t.local_mult = 0;
        t.copy_index = 7;
        compute_alignment_key(&mut t);
        assert_eq!(t.alignment_key, 5 + 7);
    }

    #[test]
    fn init_index_only_leaves_dst_idx_untouched() {
        let mut t = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        t.dst_idx = 42;
        t.index = 7;
        init_index_only(&mut t);
        assert_eq!(t.index, 0);
        assert_eq!(t.dst_idx, 42);
    }

    #[test]
    fn mark_dist_padding_if_empty_only_marks_zero_multiplicity_rows() {
        let mut empty = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        empty.final_mult = 0;
        mark_dist_padding_if_empty(&mut empty);
        assert!(empty.is_dist_padding());

        let mut nonempty = Tuple::new_source(1, [0; MAX_ATTRIBUTES]);
        nonempty.final_mult = 2;
        mark_dist_padding_if_empty(&mut nonempty);
        assert!(!nonempty.is_dist_padding());
    }

    #[test]
    fn set_join_attr_from_attribute_rejects_out_of_domain_values() {
        let mut t = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        t.attributes[0] = crate::tuple::JOIN_ATTR_MAX as i64 + 1;
        assert!(set_join_attr_from_attribute(&mut t, 0).is_err());
    }
}

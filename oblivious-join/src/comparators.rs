//! The eight comparator kinds of dispatcher family (a). Each is a pure
//! function returning a sign in `{-1, 0, 1}`; `oblivious_cas` turns that sign
//! into an in-place compare-and-swap. Grounded in
//! `enclave/trusted/operations/comparators.c`'s `comparator_*_op` family.

use crate::tuple::Tuple;

/// Identifies which of the eight orderings a batched comparator pass uses.
/// DISTRIBUTE is listed here for completeness but is not a total order and
/// is dispatched separately (see `oblivious::cas::oblivious_cas_distribute`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparatorKind {
    JoinAttr,
    Pairwise,
    EndFirst,
    JoinThenOther,
    OriginalIndex,
    AlignmentKey,
    PaddingLast,
    Distribute,
}

impl ComparatorKind {
    /// Returns the comparator function for this kind, or `None` for
    /// `Distribute`, which has no total-order comparator.
    pub fn compare_fn(self) -> Option<crate::oblivious::cas::CompareFn> {
        match self {
            ComparatorKind::JoinAttr => Some(cmp_join_attr),
            ComparatorKind::Pairwise => Some(cmp_pairwise),
            ComparatorKind::EndFirst => Some(cmp_end_first),
            ComparatorKind::JoinThenOther => Some(cmp_join_then_other),
            ComparatorKind::OriginalIndex => Some(cmp_original_index),
            ComparatorKind::AlignmentKey => Some(cmp_alignment_key),
            ComparatorKind::PaddingLast => Some(cmp_padding_last),
            ComparatorKind::Distribute => None,
        }
    }
}

fn sign_i64(d: i64) -> i32 {
    if d > 0 {
        1
    } else if d < 0 {
        -1
    } else {
        0
    }
}

/// Primary `join_attr`, tie-broken by the entry-type precedence table so
/// that for any boundary pair derived from a parent value `v`, SOURCE
/// tuples strictly inside the matching interval sort between the START and
/// the END.
pub fn cmp_join_attr(a: &Tuple, b: &Tuple) -> i32 {
    let d = a.join_attr as i64 - b.join_attr as i64;
    if d != 0 {
        return sign_i64(d);
    }
    sign_i64(a.precedence() as i64 - b.precedence() as i64)
}

/// Boundary-type first (START|END before SOURCE), then `original_index`,
/// then START before END. Used to bring a START/END pair derived from the
/// same parent tuple adjacent to each other.
pub fn cmp_pairwise(a: &Tuple, b: &Tuple) -> i32 {
    let a_is_source = a.is_source() as i64;
    let b_is_source = b.is_source() as i64;
    if a_is_source != b_is_source {
        return sign_i64(a_is_source - b_is_source);
    }
    let d = a.original_index as i64 - b.original_index as i64;
    if d != 0 {
        return sign_i64(d);
    }
    sign_i64(a.is_end() as i64 - b.is_end() as i64)
}

/// END before everything else, then `original_index`.
pub fn cmp_end_first(a: &Tuple, b: &Tuple) -> i32 {
    let a_not_end = !a.is_end() as i64;
    let b_not_end = !b.is_end() as i64;
    if a_not_end != b_not_end {
        return sign_i64(a_not_end - b_not_end);
    }
    sign_i64(a.original_index as i64 - b.original_index as i64)
}

/// `join_attr`, then each payload attribute in index order.
pub fn cmp_join_then_other(a: &Tuple, b: &Tuple) -> i32 {
    let d = a.join_attr as i64 - b.join_attr as i64;
    if d != 0 {
        return sign_i64(d);
    }
    for k in 0..a.attributes.len() {
        let d = a.attributes[k] - b.attributes[k];
        if d != 0 {
            return sign_i64(d);
        }
    }
    0
}

/// `original_index` alone.
pub fn cmp_original_index(a: &Tuple, b: &Tuple) -> i32 {
    sign_i64(a.original_index as i64 - b.original_index as i64)
}

/// `alignment_key`, then `join_attr`, then `copy_index`.
pub fn cmp_alignment_key(a: &Tuple, b: &Tuple) -> i32 {
    let d = a.alignment_key - b.alignment_key;
    if d != 0 {
        return sign_i64(d);
    }
    let d = a.join_attr as i64 - b.join_attr as i64;
    if d != 0 {
        return sign_i64(d);
    }
    sign_i64(a.copy_index - b.copy_index)
}

/// DIST_PADDING to the tail, otherwise by `original_index`.
pub fn cmp_padding_last(a: &Tuple, b: &Tuple) -> i32 {
    let a_pad = a.is_dist_padding() as i64;
    let b_pad = b.is_dist_padding() as i64;
    if a_pad != b_pad {
        return sign_i64(a_pad - b_pad);
    }
    sign_i64(a.original_index as i64 - b.original_index as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{EqualityType, FieldType, MAX_ATTRIBUTES};

    fn mk(original_index: u32, field_type: FieldType, join_attr: i32) -> Tuple {
        let mut t = Tuple::new_source(original_index, [0; MAX_ATTRIBUTES]);
        t.field_type = field_type;
        t.join_attr = join_attr;
        t
    }

    #[test]
    fn join_attr_breaks_ties_by_precedence() {
        let source = mk(0, FieldType::Source, 5);
        let mut end_eq = mk(1, FieldType::End, 5);
        end_eq.equality_type = EqualityType::Eq;
        // precedence(SOURCE) = 2 < precedence(END, EQ) = 3, so source sorts first.
        assert_eq!(cmp_join_attr(&source, &end_eq), -1);
    }

    #[test]
    fn pairwise_orders_boundary_before_source() {
        let boundary = mk(0, FieldType::Start, 0);
        let source = mk(0, FieldType::Source, 0);
        assert_eq!(cmp_pairwise(&boundary, &source), -1);
    }

    #[test]
    fn end_first_orders_end_ahead_of_everything() {
        let end = mk(5, FieldType::End, 0);
        let source = mk(0, FieldType::Source, 0);
        assert_eq!(cmp_end_first(&end, &source), -1);
    }

    #[test]
    fn padding_last_orders_dist_padding_to_tail() {
        let normal = mk(0, FieldType::Source, 0);
        let padding = mk(1, FieldType::DistPadding, 0);
        assert_eq!(cmp_padding_last(&normal, &padding), -1);
    }
}

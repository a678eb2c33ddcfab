//! Balanced compaction (§4.2): given a per-row "keep" predicate, moves every
//! kept row to a contiguous prefix, preserving relative order, and is
//! oblivious in the same sense as the rest of this module — `keep` is
//! evaluated once per row to produce an arithmetic key, never to decide
//! which comparisons run.
//!
//! Builds on the existing bitonic network rather than `ocompact.hpp`'s
//! dedicated O(n) butterfly construction (see DESIGN.md): sorting by a
//! boolean keep/drop key already gives the same contiguous-prefix result,
//! at O(n log^2 n) compare-and-swaps instead of O(n log n). Consumes the
//! `local_weight` scratch field as its sort key; callers must not rely on
//! `local_weight` surviving a call to `oblivious_compact`.

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

fn cmp_compaction_order(a: &Tuple, b: &Tuple) -> i32 {
    let d = a.local_weight - b.local_weight;
    if d != 0 {
        return sign(d);
    }
    sign(a.original_index as i64 - b.original_index as i64)
}

/// Stamps `local_weight` with 0 for every row `keep` accepts and 1 for
/// every row it rejects, then sorts by `(local_weight, original_index)`.
/// After this call, `data[0..k]` (where `k` is the number of kept rows) are
/// exactly the kept rows in their original relative order.
pub fn oblivious_compact(data: &mut Vec<Tuple>, keep: impl Fn(&Tuple) -> bool) {
    for t in data.iter_mut() {
        t.local_weight = if keep(t) { 0 } else { 1 };
    }
    bitonic_sort(data, cmp_compaction_order);
}

/// As [`oblivious_compact`], but also returns the number of kept rows so
/// callers can slice the contiguous prefix without re-evaluating `keep`.
pub fn oblivious_compact_counted(data: &mut Vec<Tuple>, keep: impl Fn(&Tuple) -> bool) -> usize {
    let count = data.iter().filter(|t| keep(t)).count();
    oblivious_compact(data, keep);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{FieldType, MAX_ATTRIBUTES};

    fn mk(original_index: u32, field_type: FieldType) -> Tuple {
        let mut t = Tuple::new_source(original_index, [0; MAX_ATTRIBUTES]);
        t.field_type = field_type;
        t
    }

    #[test]
    fn moves_kept_rows_to_a_contiguous_prefix_in_order() {
        let mut data = vec![
            mk(0, FieldType::DistPadding),
            mk(1, FieldType::Source),
            mk(2, FieldType::DistPadding),
            mk(3, FieldType::Source),
            mk(4, FieldType::Source),
        ];
        let kept = oblivious_compact_counted(&mut data, |t| t.is_source());
        assert_eq!(kept, 3);
        let prefix: Vec<u32> = data[..kept].iter().map(|t| t.original_index).collect();
        assert_eq!(prefix, vec![1, 3, 4]);
        assert!(data[kept..].iter().all(|t| t.is_dist_padding()));
    }

    #[test]
    fn keeping_everything_is_a_no_op_on_order() {
        let mut data = vec![mk(0, FieldType::Source), mk(1, FieldType::Source)];
        let kept = oblivious_compact_counted(&mut data, |_| true);
        assert_eq!(kept, 2);
        assert_eq!(data[0].original_index, 0);
        assert_eq!(data[1].original_index, 1);
    }

    #[test]
    fn keeping_nothing_leaves_all_rows_as_the_suffix() {
        let mut data = vec![mk(0, FieldType::Source), mk(1, FieldType::Source)];
        let kept = oblivious_compact_counted(&mut data, |_| false);
        assert_eq!(kept, 0);
    }
}

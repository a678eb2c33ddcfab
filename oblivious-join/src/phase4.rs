//! Phase 4 — align & concatenate (§4.7). Walks the join tree in pre-order,
//! growing a single accumulator (rooted at the tree's root table) by
//! horizontally concatenating each child's expanded table in join order.
//! Grounded in `window_functions.h`'s foreign_sum/alignment_key discussion,
//! the same accumulator-fold shape §4.7 describes.

use tracing::info_span;

use crate::comparators::ComparatorKind;
use crate::config::Config;
use crate::crypto::{Key, NonceCounter};
use crate::dispatch::OpKind;
use crate::error::JoinError;
use crate::table::Table;
use crate::tree::JoinTree;

/// Runs Phase 4 over the whole tree, leaving the join result in the root
/// node's table.
pub fn run(tree: &mut JoinTree, config: &Config, key: &Key, counter: &mut NonceCounter) -> Result<(), JoinError> {
    let root = tree.root();
    for idx in tree.pre_order() {
        if idx == root {
            continue;
        }
        let span = info_span!("phase4_align_concatenate", node = idx);
        let _enter = span.enter();

        {
            let child = &mut tree.node_mut(idx).table;
            let ops = child.all_rows_unary();
            child.batched_map(OpKind::ComputeAlignmentKey, &ops, key, counter)?;
            child.sort(ComparatorKind::AlignmentKey, config, key, counter)?;
        }
        {
            let acc = &mut tree.node_mut(root).table;
            acc.sort(ComparatorKind::JoinThenOther, config, key, counter)?;
        }
        let (acc_table, child_table) = tree.two_tables_mut(root, idx);
        let merged = acc_table.concat_horizontal(child_table)?;
        tree.node_mut(root).table = merged;
    }
    Ok(())
}

/// The single-edge step of §4.7, extracted for direct testing: aligns
/// `child` against `accumulator` and returns their horizontal concat.
pub fn align_and_concat(
    accumulator: &mut Table,
    child: &mut Table,
    config: &Config,
    key: &Key,
    counter: &mut NonceCounter,
) -> Result<Table, JoinError> {
    let ops = child.all_rows_unary();
    child.batched_map(OpKind::ComputeAlignmentKey, &ops, key, counter)?;
    child.sort(ComparatorKind::AlignmentKey, config, key, counter)?;
    accumulator.sort(ComparatorKind::JoinThenOther, config, key, counter)?;
    accumulator.concat_horizontal(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Tuple, MAX_ATTRIBUTES};

    fn key() -> Key {
        Key::new([13u8; 16])
    }

    fn acc_row(original_index: u32, join_attr: i32, a: i64) -> Tuple {
        let mut t = Tuple::new_source(original_index, [0; MAX_ATTRIBUTES]);
        t.join_attr = join_attr;
        t.attributes[0] = a;
        t
    }

    fn child_row(original_index: u32, b: i64, foreign_sum: i64, local_mult: i64, copy_index: i64) -> Tuple {
        let mut t = Tuple::new_source(original_index, [0; MAX_ATTRIBUTES]);
        t.attributes[0] = b;
        t.foreign_sum = foreign_sum;
        t.local_mult = local_mult;
        t.copy_index = copy_index;
        t
    }

    #[test]
    fn aligns_child_rows_to_their_accumulator_bucket_and_concatenates() {
        let mut accumulator = Table::new(vec!["a".into()]).unwrap();
        accumulator.append(acc_row(0, 10, 100));
        accumulator.append(acc_row(1, 20, 200));

        let mut child = Table::new(vec!["b".into()]).unwrap();
        // child row A belongs to accumulator bucket 1, child row B to bucket 0.
        child.append(child_row(0, 111, 1, 1, 0));
        child.append(child_row(1, 222, 0, 1, 0));

        let k = key();
        let mut counter = NonceCounter::new();
        let config = Config::default();

        let merged = align_and_concat(&mut accumulator, &mut child, &config, &k, &mut counter).unwrap();
        assert_eq!(merged.schema, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(merged.index(0).unwrap().attributes[0], 100);
        assert_eq!(merged.index(0).unwrap().attributes[1], 222);
        assert_eq!(merged.index(1).unwrap().attributes[0], 200);
        assert_eq!(merged.index(1).unwrap().attributes[1], 111);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut accumulator = Table::new(vec!["a".into()]).unwrap();
        accumulator.append(acc_row(0, 10, 100));
        let mut child = Table::new(vec!["b".into()]).unwrap();
        child.append(child_row(0, 111, 0, 1, 0));
        child.append(child_row(1, 222, 0, 1, 0));

        let k = key();
        let mut counter = NonceCounter::new();
        let config = Config::default();
        assert!(align_and_concat(&mut accumulator, &mut child, &config, &k, &mut counter).is_err());
    }
}

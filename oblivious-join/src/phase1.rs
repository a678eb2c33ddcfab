//! Phase 1 — bottom-up multiplicities (§4.4). Post-order traversal of the
//! join tree; leaves get `local_mult = 1`, internal nodes fold each child
//! in turn via the dual-entry technique. Grounded in the bottom-up
//! pseudocode of `impl/src/app/phases/phase1_bottom_up.h`.

use tracing::info_span;

use crate::comparators::ComparatorKind;
use crate::config::Config;
use crate::crypto::{self, Key, NonceCounter};
use crate::dispatch::OpKind;
use crate::error::JoinError;
use crate::table::Table;
use crate::transform_ops;
use crate::tree::{JoinConstraint, JoinTree};
use crate::tuple::Tuple;

/// Runs Phase 1 over the whole tree: leaves first, each child folded into
/// its parent in turn.
pub fn run(tree: &mut JoinTree, config: &Config, key: &Key, counter: &mut NonceCounter) -> Result<(), JoinError> {
    for idx in tree.post_order() {
        let children = tree.children(idx).to_vec();
        if children.is_empty() {
            let node = tree.node_mut(idx);
            let ops = node.table.all_rows_unary();
            node.table.batched_map(OpKind::SetLocalMultOne, &ops, key, counter)?;
            continue;
        }
        for child_idx in children {
            let constraint = tree
                .node(child_idx)
                .constraint
                .expect("a non-root node always carries a join constraint");
            let (parent_table, child_table) = tree.two_tables_mut(idx, child_idx);
            compute_local_multiplicities(parent_table, child_table, constraint, config, key, counter)?;
        }
    }
    Ok(())
}

/// Decrypts a clone of `rows` into plaintext and applies `xform` to each
/// row. The clone is ephemeral (discarded once Phase 1's combined table is
/// consumed), so it is never re-encrypted.
fn decrypted_clone(rows: &[Tuple], key: &Key, mut xform: impl FnMut(&mut Tuple) -> Result<(), JoinError>) -> Result<Vec<Tuple>, JoinError> {
    let mut out = rows.to_vec();
    for t in out.iter_mut() {
        if t.is_encrypted {
            crypto::decrypt(t, key).map_err(JoinError::CryptoFailure)?;
        }
        xform(t)?;
    }
    Ok(out)
}

/// ComputeLocalMultiplicities(R_u, R_c, constraint): folds child `R_c`
/// into parent `R_u` so that, afterward, `R_u`'s `local_mult` accounts for
/// matches against `R_c` (I1).
pub fn compute_local_multiplicities(
    parent: &mut Table,
    child: &mut Table,
    constraint: JoinConstraint,
    config: &Config,
    key: &Key,
    counter: &mut NonceCounter,
) -> Result<(), JoinError> {
    let span = info_span!("phase1_bottom_up", parent_len = parent.len(), child_len = child.len());
    let _enter = span.enter();

    // Step 1: build the combined table.
    let sources = decrypted_clone(child.rows(), key, |t| {
        transform_ops::to_source(t);
        Ok(())
    })?;
    let starts = decrypted_clone(parent.rows(), key, |t| {
        transform_ops::to_start(t, constraint.delta_start, constraint.eq_start)
    })?;
    let ends = decrypted_clone(parent.rows(), key, |t| {
        transform_ops::to_end(t, constraint.delta_end, constraint.eq_end)
    })?;

    let mut comb_rows = Vec::with_capacity(sources.len() + starts.len() + ends.len());
    comb_rows.extend(sources);
    comb_rows.extend(starts);
    comb_rows.extend(ends);
    let mut comb = Table::from_rows(Vec::new(), comb_rows)?;

    // Step 2.
    let ops = comb.all_rows_unary();
    comb.batched_map(OpKind::InitLocalWindow, &ops, key, counter)?;

    // Steps 3-4.
    comb.sort(ComparatorKind::JoinAttr, config, key, counter)?;
    comb.batched_linear_pass(OpKind::WindowLocalSum, key, counter)?;

    // Steps 5-6.
    comb.sort(ComparatorKind::Pairwise, config, key, counter)?;
    comb.batched_linear_pass(OpKind::WindowLocalInterval, key, counter)?;

    // Step 7.
    comb.sort(ComparatorKind::EndFirst, config, key, counter)?;

    // Step 8: the first |R_u| rows are the END entries, ordered by
    // original_index; align R_u the same way and apply the update.
    let p_len = parent.len();
    let mut interval_carriers = Table::from_rows(Vec::new(), comb.rows()[..p_len].to_vec())?;
    interval_carriers.sort(ComparatorKind::OriginalIndex, config, key, counter)?;
    parent.sort(ComparatorKind::OriginalIndex, config, key, counter)?;
    parent.apply_parallel_update(&interval_carriers, OpKind::UpdateLocalMultiplicity, key, counter)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{EqualityType, MAX_ATTRIBUTES};

    fn key() -> Key {
        Key::new([5u8; 16])
    }

    fn row(original_index: u32, join_attr: i32) -> Tuple {
        let mut t = Tuple::new_source(original_index, [0; MAX_ATTRIBUTES]);
        t.join_attr = join_attr;
        t
    }

    fn eq_constraint(delta_start: i32, delta_end: i32) -> JoinConstraint {
        JoinConstraint {
            delta_start,
            eq_start: EqualityType::Eq,
            delta_end,
            eq_end: EqualityType::Eq,
        }
    }

    #[test]
    fn equijoin_multiplicities_match_brute_force() {
        // A = [1, 2, 2, 3], B = [2, 2, 4]; equijoin on value.
        let mut parent = Table::new(Vec::new()).unwrap();
        for (i, v) in [1, 2, 2, 3].into_iter().enumerate() {
            parent.append(row(i as u32, v));
        }
        let mut child = Table::new(Vec::new()).unwrap();
        for (i, v) in [2, 2, 4].into_iter().enumerate() {
            child.append(row(i as u32, v));
        }

        let k = key();
        let mut counter = NonceCounter::new();
        let config = Config::default();
        compute_local_multiplicities(&mut parent, &mut child, eq_constraint(0, 0), &config, &k, &mut counter)
            .unwrap();

        parent.sort(ComparatorKind::OriginalIndex, &config, &k, &mut counter).unwrap();
        let mults: Vec<i64> = parent.rows().iter().map(|t| t.local_mult).collect();
        // value 1 matches nothing, value 2 matches both child 2s, value 3 matches nothing.
        assert_eq!(mults, vec![0, 2, 2, 0]);
    }

    #[test]
    fn band_join_counts_matches_within_band() {
        // A = [10, 20], B = [8, 11, 19, 21, 30], band [-2, +2] closed.
        let mut parent = Table::new(Vec::new()).unwrap();
        for (i, v) in [10, 20].into_iter().enumerate() {
            parent.append(row(i as u32, v));
        }
        let mut child = Table::new(Vec::new()).unwrap();
        for (i, v) in [8, 11, 19, 21, 30].into_iter().enumerate() {
            child.append(row(i as u32, v));
        }

        let k = key();
        let mut counter = NonceCounter::new();
        let config = Config::default();
        compute_local_multiplicities(&mut parent, &mut child, eq_constraint(-2, 2), &config, &k, &mut counter)
            .unwrap();

        parent.sort(ComparatorKind::OriginalIndex, &config, &k, &mut counter).unwrap();
        let mults: Vec<i64> = parent.rows().iter().map(|t| t.local_mult).collect();
        // 10 matches 8,11 (within [8,12]); 20 matches 19,21 (within [18,22]).
        assert_eq!(mults, vec![2, 2]);
    }
}

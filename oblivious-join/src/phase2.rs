//! Phase 2 — top-down multiplicities (§4.5). Pre-order traversal; the root
//! seeds `final_mult` from its Phase 1 `local_mult`, then each parent
//! propagates a foreign multiplicity down to every child. Grounded in the
//! top-down pseudocode of `window_functions.h`.
//!
//! Design note (see DESIGN.md): unlike §4.5 step 1's literal wording, the
//! combined table here is built with the *child* contributing the
//! START/END boundary pair and the *parent* contributing SOURCE — the
//! reverse of Phase 1's roles. This is required for `compute_foreign_sum`'s
//! documented behavior ("at a SOURCE (parent) tuple...") and for step 4's
//! truncation to `|R_c|` (the END count must equal the boundary-providing
//! table's length) to be internally consistent. Because a child's matching
//! interval for parent value `v` is `[v+delta_start, v+delta_end]`, the set
//! of parent values matching a fixed child value `c` is
//! `[c-delta_end, c-delta_start]`; the child's START/END deltas and
//! equality flags are therefore negated and swapped relative to Phase 1.

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

pub fn run(tree: &mut JoinTree, config: &Config, key: &Key, counter: &mut NonceCounter) -> Result<(), JoinError> {
    let root = tree.root();
    {
        let node = tree.node_mut(root);
        let ops = node.table.all_rows_unary();
        node.table.batched_map(OpKind::InitFinalMultFromLocal, &ops, key, counter)?;
    }

    for idx in tree.pre_order() {
        let children = tree.children(idx).to_vec();
        for child_idx in children {
            let constraint = tree
                .node(child_idx)
                .constraint
                .expect("a non-root node always carries a join constraint");
            let (parent_table, child_table) = tree.two_tables_mut(idx, child_idx);
            propagate_final_multiplicities(parent_table, child_table, constraint, config, key, counter)?;
        }
    }
    Ok(())
}

fn decrypted_clone(
    rows: &[Tuple],
    key: &Key,
    mut xform: impl FnMut(&mut Tuple) -> Result<(), JoinError>,
) -> Result<Vec<Tuple>, JoinError> {
    let mut out = rows.to_vec();
    for t in out.iter_mut() {
        if t.is_encrypted {
            crypto::decrypt(t, key).map_err(JoinError::CryptoFailure)?;
        }
        xform(t)?;
    }
    Ok(out)
}

/// PropagateFinalMultiplicities(R_u, R_c, constraint).
pub fn propagate_final_multiplicities(
    parent: &mut Table,
    child: &mut Table,
    constraint: JoinConstraint,
    config: &Config,
    key: &Key,
    counter: &mut NonceCounter,
) -> Result<(), JoinError> {
    let span = info_span!("phase2_top_down", parent_len = parent.len(), child_len = child.len());
    let _enter = span.enter();

    let sources = decrypted_clone(parent.rows(), key, |t| {
        transform_ops::to_source(t);
        Ok(())
    })?;
    let starts = decrypted_clone(child.rows(), key, |t| {
        transform_ops::to_start(t, -constraint.delta_end, constraint.eq_end)
    })?;
    let ends = decrypted_clone(child.rows(), key, |t| {
        transform_ops::to_end(t, -constraint.delta_start, constraint.eq_start)
    })?;

    let mut comb_rows = Vec::with_capacity(sources.len() + starts.len() + ends.len());
    comb_rows.extend(sources);
    comb_rows.extend(starts);
    comb_rows.extend(ends);
    let mut comb = Table::from_rows(Vec::new(), comb_rows)?;

    let ops = comb.all_rows_unary();
    comb.batched_map(OpKind::InitForeignWindow, &ops, key, counter)?;

    comb.sort(ComparatorKind::JoinAttr, config, key, counter)?;
    comb.batched_linear_pass(OpKind::WindowForeignSum, key, counter)?;

    comb.sort(ComparatorKind::Pairwise, config, key, counter)?;
    comb.batched_linear_pass(OpKind::WindowForeignInterval, key, counter)?;

    comb.sort(ComparatorKind::EndFirst, config, key, counter)?;

    let c_len = child.len();
    let mut foreign_carriers = Table::from_rows(Vec::new(), comb.rows()[..c_len].to_vec())?;
    foreign_carriers.sort(ComparatorKind::OriginalIndex, config, key, counter)?;
    child.sort(ComparatorKind::OriginalIndex, config, key, counter)?;
    child.apply_parallel_update(&foreign_carriers, OpKind::UpdateFinalMultiplicity, key, counter)?;

    Ok(())
}

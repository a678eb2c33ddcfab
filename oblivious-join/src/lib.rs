//! Oblivious evaluation of acyclic join trees over encrypted relational
//! tuples (§1-§2): a join tree is built up node by node, each edge carrying
//! a [`tree::JoinConstraint`], and [`run_join`] drives it through the four
//! phases of §4 — bottom-up multiplicities, top-down multiplicities,
//! distribute & expand, align & concatenate — leaving the result in the
//! tree's root table.
//!
//! The [`hash_index`] module is a separate, self-contained component (§4.9)
//! used by hop-style point lookups over a graph-shaped catalog; it is not
//! part of the join pipeline `run_join` drives.

pub mod comparators;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod hash_index;
pub mod oblivious;
pub mod phase1;
pub mod phase2;
pub mod phase3;
pub mod phase4;
pub mod sort;
pub mod table;
pub mod transform_ops;
pub mod tree;
pub mod tuple;
pub mod update_ops;
pub mod window_ops;

use tracing::info_span;

use crate::config::Config;
use crate::crypto::{Key, NonceCounter};
use crate::error::JoinError;
use crate::table::Table;
use crate::tree::JoinTree;

/// Runs the full four-phase pipeline (§4.4-§4.7) over `tree`, consuming its
/// per-node intermediate tables in place, and returns the final joined
/// table (equivalently, `tree`'s root table after the run).
///
/// Ordering follows §5: Phase 1 is a post-order (leaves-first) pass, Phases
/// 2 and 4 are pre-order (root-first) passes, and Phase 3 runs once per
/// table regardless of tree shape. Each phase is fully materialized before
/// the next begins — no overlap between phases.
pub fn run_join(tree: &mut JoinTree, config: &Config, key: &Key, counter: &mut NonceCounter) -> Result<Table, JoinError> {
    config.validate()?;

    let span = info_span!("run_join", node_count = tree.len());
    let _enter = span.enter();

    phase1::run(tree, config, key, counter)?;
    phase2::run(tree, config, key, counter)?;

    for idx in 0..tree.len() {
        phase3::run(&mut tree.node_mut(idx).table, config, key, counter)?;
    }

    phase4::run(tree, config, key, counter)?;

    let root = tree.root();
    Ok(std::mem::replace(&mut tree.node_mut(root).table, Table::new(Vec::new())?))
}

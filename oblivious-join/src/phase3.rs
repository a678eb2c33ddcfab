//! Phase 3 — distribute & expand (§4.6). Runs once per table, independent
//! of the join tree's shape, once Phase 2 has given every row a valid
//! `final_mult`. Grounded in
//! `examples/original_source/app/algorithms/distribute_expand.cpp` and
//! `phase3_distribute_expand.h`'s step numbering, which the comments below
//! follow one for one.

use tracing::info_span;

use crate::comparators::ComparatorKind;
use crate::config::Config;
use crate::crypto::{Key, NonceCounter};
use crate::dispatch::{self, OpKind};
use crate::error::JoinError;
use crate::table::Table;
use crate::tuple::FieldType;

/// Distributes and expands `table` in place so that, afterward, every
/// original row is present exactly `final_mult` times (I4).
pub fn run(table: &mut Table, config: &Config, key: &Key, counter: &mut NonceCounter) -> Result<(), JoinError> {
    let span = info_span!("phase3_distribute_expand", len = table.len());
    let _enter = span.enter();

    if table.is_empty() {
        return Ok(());
    }

    // Step 1: dst_idx <- exclusive prefix sum of final_mult.
    let ops = table.all_rows_unary();
    table.batched_map(OpKind::InitDstIdxAndIndex, &ops, key, counter)?;
    table.batched_linear_pass(OpKind::WindowDstIdx, key, counter)?;

    // Step 2: N' = (last row).dst_idx + (last row).final_mult.
    let n_prime = output_size(table, key, counter)?;
    if n_prime == 0 {
        table.truncate_to(0);
        return Ok(());
    }

    // Step 3: mark empty rows DIST_PADDING, sort them to the tail, truncate.
    let ops = table.all_rows_unary();
    table.batched_map(OpKind::MarkDistPaddingIfEmpty, &ops, key, counter)?;
    table.sort(ComparatorKind::PaddingLast, config, key, counter)?;
    let keep = table.len().min(n_prime);
    table.truncate_to(keep);

    // Step 4: pad up to N'.
    if n_prime > table.len() {
        table.add_padding(n_prime - table.len(), FieldType::DistPadding);
    }

    // Step 5: index <- 0..N'-1. Must not disturb the dst_idx prefix sums
    // from step 1, which step 6's distribution network still reads.
    let ops = table.all_rows_unary();
    table.batched_map(OpKind::InitIndexOnly, &ops, key, counter)?;
    table.batched_linear_pass(OpKind::WindowIncrementIndex, key, counter)?;

    // Step 6: variable-stride distribution network.
    let mut stride = largest_power_of_two_leq(table.len());
    while stride >= 1 {
        table.batched_distribute_pass(stride, OpKind::Compare(ComparatorKind::Distribute), key, counter)?;
        stride /= 2;
    }

    // Step 7: expansion pass.
    table.batched_linear_pass(OpKind::WindowExpandCopy, key, counter)?;

    Ok(())
}

fn output_size(table: &mut Table, key: &Key, counter: &mut NonceCounter) -> Result<usize, JoinError> {
    let last = table.len() - 1;
    let n = dispatch::with_decrypted(&mut table.rows_mut()[last..], key, counter, |s| {
        Ok(s[0].dst_idx + s[0].final_mult)
    })?;
    Ok(n.max(0) as usize)
}

fn largest_power_of_two_leq(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut p = 1usize;
    while p * 2 <= n {
        p *= 2;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Tuple, MAX_ATTRIBUTES};

    fn key() -> Key {
        Key::new([7u8; 16])
    }

    fn row(original_index: u32, final_mult: i64) -> Tuple {
        let mut t = Tuple::new_source(original_index, [original_index as i64; MAX_ATTRIBUTES]);
        t.final_mult = final_mult;
        t
    }

    fn brute_force_expand(rows: &[(u32, i64)]) -> Vec<(u32, i64)> {
        let mut out = Vec::new();
        for &(idx, mult) in rows {
            for copy in 0..mult {
                out.push((idx, copy));
            }
        }
        out
    }

    fn run_and_collect(rows: Vec<(u32, i64)>) -> Vec<(u32, i64)> {
        let mut table = Table::new(Vec::new()).unwrap();
        for (idx, mult) in &rows {
            table.append(row(*idx, *mult));
        }
        let k = key();
        let mut counter = NonceCounter::new();
        let config = Config::default();
        run(&mut table, &config, &k, &mut counter).unwrap();
        table
            .rows()
            .iter()
            .map(|t| (t.original_index, t.copy_index))
            .collect()
    }

    #[test]
    fn expands_every_row_by_its_final_multiplicity() {
        let rows = vec![(0u32, 2i64), (1, 0), (2, 3), (3, 1)];
        let mut got = run_and_collect(rows.clone());
        got.sort();
        let mut want = brute_force_expand(&rows);
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn all_zero_multiplicities_yield_an_empty_table() {
        let rows = vec![(0u32, 0i64), (1, 0)];
        let got = run_and_collect(rows);
        assert!(got.is_empty());
    }

    #[test]
    fn brute_force_matches_optimized_for_small_tables() {
        // Mirrors the |R'| <= 16 scenario: every possible multiplicity
        // assignment for a 4-row table with multiplicities in 0..=3.
        for a in 0..4i64 {
            for b in 0..4i64 {
                for c in 0..4i64 {
                    let rows = vec![(0u32, a), (1, b), (2, c), (3, 1)];
                    let mut got = run_and_collect(rows.clone());
                    got.sort();
                    let mut want = brute_force_expand(&rows);
                    want.sort();
                    assert_eq!(got, want, "mismatch for multiplicities {:?}", rows);
                }
            }
        }
    }
}

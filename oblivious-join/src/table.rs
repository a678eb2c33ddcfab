//! §4.1: the central abstraction the four join phases operate on — a
//! homogeneous sequence of augmented tuples plus an ordered schema. Every
//! operation that touches tuple content goes through the dispatcher or a
//! sort primitive, both of which cross the confidentiality boundary at
//! most once per call.
//!
//! Grounded on the teacher's `consolidation.rs` for the "single forward
//! pass with an accumulator over a `Vec`" shape (`batched_linear_pass`
//! generalizes `consolidate_slice_slow`'s loop structure to an arbitrary
//! binary operator).

use tracing::trace;

use crate::comparators::ComparatorKind;
use crate::config::Config;
use crate::crypto::{Key, NonceCounter};
use crate::dispatch::{self, Op, OpKind};
use crate::error::JoinError;
use crate::oblivious::bitonic::bitonic_sort;
use crate::transform_ops;
use crate::tuple::{FieldType, Tuple, MAX_ATTRIBUTES};

/// A homogeneous, ordered collection of augmented tuples.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: Vec<String>,
    rows: Vec<Tuple>,
}

impl Table {
    pub fn new(schema: Vec<String>) -> Result<Self, JoinError> {
        if schema.len() > MAX_ATTRIBUTES {
            return Err(JoinError::CapacityExceeded {
                requested: schema.len(),
                limit: MAX_ATTRIBUTES,
            });
        }
        Ok(Table { schema, rows: Vec::new() })
    }

    pub fn from_rows(schema: Vec<String>, rows: Vec<Tuple>) -> Result<Self, JoinError> {
        let table = Self::new(schema)?;
        Ok(Table { rows, ..table })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Tuple] {
        &mut self.rows
    }

    pub fn index(&self, i: usize) -> Option<&Tuple> {
        self.rows.get(i)
    }

    pub fn append(&mut self, row: Tuple) {
        self.rows.push(row);
    }

    /// Drops every row past index `n`. Used after a PADDING_LAST sort to
    /// discard the padding rows sorted to the tail (§4.6 step 3).
    pub fn truncate_to(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    pub fn rename(&mut self, names: Vec<String>) -> Result<(), JoinError> {
        if names.len() != self.schema.len() {
            return Err(JoinError::InvalidArgument(format!(
                "rename supplied {} names for a schema of {} columns",
                names.len(),
                self.schema.len()
            )));
        }
        self.schema = names;
        Ok(())
    }

    /// Pads the table with `n` rows carrying `field_type`, with
    /// `original_index = ORIGINAL_INDEX_SORT_PADDING` and a zeroed payload.
    /// `field_type` is expected to be one of the two padding variants; used
    /// ahead of a sort or during distribute-and-expand.
    pub fn add_padding(&mut self, n: usize, field_type: FieldType) {
        for _ in 0..n {
            let mut t = Tuple::new_source(crate::tuple::ORIGINAL_INDEX_SORT_PADDING, [0; MAX_ATTRIBUTES]);
            match field_type {
                FieldType::SortPadding => transform_ops::mark_sort_padding(&mut t),
                FieldType::DistPadding => transform_ops::mark_dist_padding(&mut t),
                _ => t.field_type = field_type,
            }
            self.rows.push(t);
        }
    }

    /// Horizontal concatenation of two equi-length tables: the schema is
    /// the concatenation of both schemas (bounded by `MAX_ATTRIBUTES`
    /// total columns), and row `i` of the result carries the payload of
    /// `self`'s row `i` followed by `other`'s row `i`. Metadata (multiplicity
    /// and alignment fields) is taken from `self`'s row, consistent with
    /// `self` being the accumulator in Phase 4's fold.
    pub fn concat_horizontal(&self, other: &Table) -> Result<Table, JoinError> {
        if self.len() != other.len() {
            return Err(JoinError::InvalidArgument(format!(
                "horizontal concat requires equal length, got {} and {}",
                self.len(),
                other.len()
            )));
        }
        let total_cols = self.schema.len() + other.schema.len();
        if total_cols > MAX_ATTRIBUTES {
            return Err(JoinError::CapacityExceeded {
                requested: total_cols,
                limit: MAX_ATTRIBUTES,
            });
        }
        let mut schema = self.schema.clone();
        schema.extend(other.schema.iter().cloned());

        let rows = self
            .rows
            .iter()
            .zip(other.rows.iter())
            .map(|(a, b)| {
                let mut merged = *a;
                for (k, col) in b.attributes.iter().enumerate().take(other.schema.len()) {
                    merged.attributes[self.schema.len() + k] = *col;
                }
                merged
            })
            .collect();

        Table::from_rows(schema, rows)
    }

    /// Applies a unary op (dispatcher families (d)/(e)) to every row named
    /// in `ops`.
    pub fn batched_map(
        &mut self,
        kind: OpKind,
        ops: &[Op],
        key: &Key,
        counter: &mut NonceCounter,
    ) -> Result<(), JoinError> {
        trace!(len = self.rows.len(), op_count = ops.len(), "batched_map");
        dispatch::dispatch(&mut self.rows, ops, kind, key, counter)
    }

    /// Applies a binary op (dispatcher family (b)) to every adjacent pair
    /// `(row[i], row[i+1])`, left to right.
    pub fn batched_linear_pass(
        &mut self,
        kind: OpKind,
        key: &Key,
        counter: &mut NonceCounter,
    ) -> Result<(), JoinError> {
        if self.rows.len() < 2 {
            return Ok(());
        }
        let ops: Vec<Op> = (0..self.rows.len() - 1)
            .map(|i| Op::binary(i as u32, (i + 1) as u32))
            .collect();
        trace!(len = self.rows.len(), "batched_linear_pass");
        dispatch::dispatch(&mut self.rows, &ops, kind, key, counter)
    }

    /// Applies a binary op to every pair `(row[i], row[i+stride])`, per
    /// §4.6 step 6's variable-stride distribution network.
    pub fn batched_distribute_pass(
        &mut self,
        stride: usize,
        kind: OpKind,
        key: &Key,
        counter: &mut NonceCounter,
    ) -> Result<(), JoinError> {
        if stride == 0 || stride >= self.rows.len() {
            return Ok(());
        }
        let ops: Vec<Op> = (0..self.rows.len() - stride)
            .map(|i| Op::binary(i as u32, (i + stride) as u32))
            .collect();
        trace!(len = self.rows.len(), stride, "batched_distribute_pass");
        dispatch::dispatch(&mut self.rows, &ops, kind, key, counter)
    }

    /// Applies a binary update op (dispatcher family (c)) pairwise between
    /// `carriers` (read as the left-hand operand) and `self` (the
    /// right-hand operand, written in place). `carriers` must have the
    /// same length as `self`; row `i` of `carriers` updates row `i` of
    /// `self`. Used to cross from an ephemeral combined table back into a
    /// persisted table, e.g. Phase 1 step 8 and Phase 2 step 4.
    pub fn apply_parallel_update(
        &mut self,
        carriers: &Table,
        kind: OpKind,
        key: &Key,
        counter: &mut NonceCounter,
    ) -> Result<(), JoinError> {
        if carriers.len() != self.len() {
            return Err(JoinError::InvalidArgument(format!(
                "apply_parallel_update requires equal length carriers/targets, got {} and {}",
                carriers.len(),
                self.len()
            )));
        }
        let n = self.len();
        let mut combined: Vec<Tuple> = carriers.rows().to_vec();
        combined.extend_from_slice(&self.rows);
        let ops: Vec<Op> = (0..n).map(|i| Op::binary(i as u32, (n + i) as u32)).collect();
        dispatch::dispatch(&mut combined, &ops, kind, key, counter)?;
        self.rows.copy_from_slice(&combined[n..]);
        Ok(())
    }

    /// `Op::unary(i)` for every row index — the common case for
    /// `batched_map` over an entire table.
    pub fn all_rows_unary(&self) -> Vec<Op> {
        (0..self.rows.len() as u32).map(Op::unary).collect()
    }

    /// Sorts the table by `kind`. Tables within `config.batch_size` are
    /// sorted in a single batched bitonic pass; larger tables are sorted
    /// externally (§4.8).
    pub fn sort(
        &mut self,
        kind: ComparatorKind,
        config: &Config,
        key: &Key,
        counter: &mut NonceCounter,
    ) -> Result<(), JoinError> {
        let cmp = kind.compare_fn().ok_or_else(|| {
            JoinError::InvalidArgument("DISTRIBUTE has no total order and cannot be used with sort()".into())
        })?;
        trace!(len = self.rows.len(), ?kind, "sort");
        if self.rows.len() <= config.batch_size {
            dispatch::with_decrypted(&mut self.rows, key, counter, |plain| {
                let mut owned: Vec<Tuple> = plain.to_vec();
                bitonic_sort(&mut owned, cmp);
                plain.copy_from_slice(&owned);
                Ok(())
            })
        } else {
            crate::sort::external::sort_large(&mut self.rows, kind, config, key, counter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Key, NonceCounter};

    fn key() -> Key {
        Key::new([9u8; 16])
    }

    #[test]
    fn append_and_len_track_row_count() {
        let mut t = Table::new(vec!["a".into()]).unwrap();
        assert!(t.is_empty());
        t.append(Tuple::new_source(0, [0; MAX_ATTRIBUTES]));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn truncate_to_drops_trailing_rows() {
        let mut t = Table::new(vec![]).unwrap();
        for i in 0..5u32 {
            t.append(Tuple::new_source(i, [0; MAX_ATTRIBUTES]));
        }
        t.truncate_to(2);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn concat_horizontal_merges_schemas_and_payloads() {
        let mut a = Table::new(vec!["x".into()]).unwrap();
        let mut ta = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        ta.attributes[0] = 1;
        a.append(ta);

        let mut b = Table::new(vec!["y".into()]).unwrap();
        let mut tb = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        tb.attributes[0] = 2;
        b.append(tb);

        let merged = a.concat_horizontal(&b).unwrap();
        assert_eq!(merged.schema, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(merged.index(0).unwrap().attributes[0], 1);
        assert_eq!(merged.index(0).unwrap().attributes[1], 2);
    }

    #[test]
    fn concat_horizontal_rejects_length_mismatch() {
        let a = Table::new(vec!["x".into()]).unwrap();
        let mut b = Table::new(vec!["y".into()]).unwrap();
        b.append(Tuple::new_source(0, [0; MAX_ATTRIBUTES]));
        assert!(a.concat_horizontal(&b).is_err());
    }

    #[test]
    fn add_padding_marks_rows_as_dist_padding() {
        let mut t = Table::new(vec![]).unwrap();
        t.add_padding(3, FieldType::DistPadding);
        assert_eq!(t.len(), 3);
        assert!(t.rows().iter().all(|r| r.is_dist_padding()));
    }

    #[test]
    fn batched_map_runs_a_unary_transform() {
        let mut t = Table::new(vec![]).unwrap();
        let mut row = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        row.local_mult = 77;
        t.append(row);
        let k = key();
        let mut counter = NonceCounter::new();
        t.batched_map(OpKind::SetLocalMultOne, &[Op::unary(0)], &k, &mut counter)
            .unwrap();
        assert_eq!(t.index(0).unwrap().local_mult, 1);
    }

    #[test]
    fn sort_by_original_index_orders_rows() {
        let mut t = Table::new(vec![]).unwrap();
        for i in [3u32, 1, 2] {
            t.append(Tuple::new_source(i, [0; MAX_ATTRIBUTES]));
        }
        let k = key();
        let mut counter = NonceCounter::new();
        let config = Config::default();
        t.sort(ComparatorKind::OriginalIndex, &config, &k, &mut counter).unwrap();
        let order: Vec<u32> = t.rows().iter().map(|r| r.original_index).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }
}

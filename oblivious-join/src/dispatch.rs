//! The batched operator dispatcher (§4.3): the single point where the
//! "core" crosses the confidentiality boundary. Bulk-decrypts, applies one
//! operator kind across many index pairs, then bulk re-encrypts exactly the
//! rows that were encrypted on entry. Grounded in
//! `impl/src/enclave/batch/batch_dispatcher.c`'s `ecall_batch_dispatcher`.

use tracing::trace;

use crate::comparators::ComparatorKind;
use crate::crypto::{self, Key, NonceCounter};
use crate::error::JoinError;
use crate::oblivious::{oblivious_cas, oblivious_cas_distribute};
use crate::transform_ops;
use crate::tuple::{EqualityType, Tuple};
use crate::update_ops;
use crate::window_ops;

/// One scheduled invocation: operate on `tuples[i]` (and `tuples[j]` for
/// binary kinds). `j = Op::NO_J` marks a unary op. `params` carries small
/// extra arguments (a boundary deviation, an equality discipline, an
/// attribute index).
#[derive(Debug, Clone, Copy)]
pub struct Op {
    pub i: u32,
    pub j: u32,
    pub params: [i32; 2],
}

impl Op {
    pub const NO_J: u32 = u32::MAX;

    pub fn unary(i: u32) -> Self {
        Op { i, j: Self::NO_J, params: [0, 0] }
    }

    pub fn unary_with(i: u32, params: [i32; 2]) -> Self {
        Op { i, j: Self::NO_J, params }
    }

    pub fn binary(i: u32, j: u32) -> Self {
        Op { i, j, params: [0, 0] }
    }
}

/// Which pure function family (a)-(e) a batch of [`Op`]s invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Compare(ComparatorKind),
    WindowLocalSum,
    WindowLocalInterval,
    WindowForeignSum,
    WindowForeignInterval,
    WindowDstIdx,
    WindowIncrementIndex,
    WindowExpandCopy,
    UpdateLocalMultiplicity,
    UpdateFinalMultiplicity,
    ZeroScratch,
    InitLocalWindow,
    InitForeignWindow,
    InitMetadata,
    MarkSortPadding,
    MarkDistPadding,
    MarkDistPaddingIfEmpty,
    SetLocalMultOne,
    ToSource,
    ToStart,
    ToEnd,
    InitDstIdxAndIndex,
    InitIndexOnly,
    InitFinalMultFromLocal,
    SetJoinAttrFromAttribute,
    ComputeAlignmentKey,
}

fn equality_from_param(p: i32) -> EqualityType {
    if p == 0 {
        EqualityType::Eq
    } else {
        EqualityType::Neq
    }
}

/// Executes `ops` against `tuples` under `kind`, crossing the
/// confidentiality boundary at most once: every currently-encrypted tuple
/// is decrypted before dispatch and exactly those tuples are re-encrypted
/// afterward, even if a later op in the batch fails (the rollback re-
/// encrypts whatever had already been decrypted before surfacing the
/// error).
pub fn dispatch(
    tuples: &mut [Tuple],
    ops: &[Op],
    kind: OpKind,
    key: &Key,
    counter: &mut NonceCounter,
) -> Result<(), JoinError> {
    trace!(op_kind = ?kind, batch_len = ops.len(), "dispatch");
    with_decrypted(tuples, key, counter, |plain| run_ops(plain, ops, kind))
}

/// Bulk-decrypts every currently-encrypted tuple, runs `f` over the
/// plaintext slice, then bulk re-encrypts exactly those tuples — the same
/// crossing contract `dispatch` uses, exposed directly for primitives (the
/// sort network, the external merge) that aren't shaped as an `Op` array.
pub fn with_decrypted<T>(
    tuples: &mut [Tuple],
    key: &Key,
    counter: &mut NonceCounter,
    f: impl FnOnce(&mut [Tuple]) -> Result<T, JoinError>,
) -> Result<T, JoinError> {
    let mut decrypted: Vec<usize> = Vec::new();
    for (idx, t) in tuples.iter_mut().enumerate() {
        if t.is_encrypted {
            if let Err(e) = crypto::decrypt(t, key) {
                for &done in &decrypted {
                    let _ = crypto::encrypt(&mut tuples[done], key, counter);
                }
                return Err(JoinError::CryptoFailure(e));
            }
            decrypted.push(idx);
        }
    }

    let result = f(tuples);

    for &idx in &decrypted {
        crypto::encrypt(&mut tuples[idx], key, counter).map_err(JoinError::CryptoFailure)?;
    }

    result
}

fn run_ops(tuples: &mut [Tuple], ops: &[Op], kind: OpKind) -> Result<(), JoinError> {
    for op in ops {
        match kind {
            OpKind::Compare(comparator_kind) => {
                if comparator_kind == ComparatorKind::Distribute {
                    let (a, b) = two_mut(tuples, op.i as usize, op.j as usize);
                    oblivious_cas_distribute(a, b);
                } else {
                    let cmp = comparator_kind.compare_fn().expect("non-distribute kind has a comparator");
                    let (a, b) = two_mut(tuples, op.i as usize, op.j as usize);
                    oblivious_cas(a, b, cmp);
                }
            }
            OpKind::WindowLocalSum => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                window_ops::compute_local_sum(e1, e2);
            }
            OpKind::WindowLocalInterval => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                window_ops::compute_local_interval(e1, e2);
            }
            OpKind::WindowForeignSum => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                window_ops::compute_foreign_sum(e1, e2);
            }
            OpKind::WindowForeignInterval => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                window_ops::compute_foreign_interval(e1, e2);
            }
            OpKind::WindowDstIdx => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                window_ops::compute_dst_idx(e1, e2);
            }
            OpKind::WindowIncrementIndex => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                window_ops::increment_index(e1, e2);
            }
            OpKind::WindowExpandCopy => {
                let (e1, e2) = two_mut(tuples, op.i as usize, op.j as usize);
                window_ops::expand_copy(e1, e2);
            }
            OpKind::UpdateLocalMultiplicity => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                update_ops::update_target_multiplicity(e1, e2);
            }
            OpKind::UpdateFinalMultiplicity => {
                let (e1, e2) = split_ref_mut(tuples, op.i as usize, op.j as usize);
                update_ops::update_target_final_multiplicity(e1, e2);
            }
            OpKind::ZeroScratch => transform_ops::zero_scratch(&mut tuples[op.i as usize]),
            OpKind::InitLocalWindow => transform_ops::init_local_window(&mut tuples[op.i as usize]),
            OpKind::InitForeignWindow => transform_ops::init_foreign_window(&mut tuples[op.i as usize]),
            OpKind::InitMetadata => transform_ops::init_metadata(&mut tuples[op.i as usize]),
            OpKind::MarkSortPadding => transform_ops::mark_sort_padding(&mut tuples[op.i as usize]),
            OpKind::MarkDistPadding => transform_ops::mark_dist_padding(&mut tuples[op.i as usize]),
            OpKind::MarkDistPaddingIfEmpty => {
                transform_ops::mark_dist_padding_if_empty(&mut tuples[op.i as usize])
            }
            OpKind::SetLocalMultOne => transform_ops::set_local_mult_one(&mut tuples[op.i as usize]),
            OpKind::ToSource => transform_ops::to_source(&mut tuples[op.i as usize]),
            OpKind::ToStart => {
                let eq = equality_from_param(op.params[1]);
                transform_ops::to_start(&mut tuples[op.i as usize], op.params[0], eq)?;
            }
            OpKind::ToEnd => {
                let eq = equality_from_param(op.params[1]);
                transform_ops::to_end(&mut tuples[op.i as usize], op.params[0], eq)?;
            }
            OpKind::InitDstIdxAndIndex => {
                transform_ops::init_dst_idx_and_index(&mut tuples[op.i as usize])
            }
            OpKind::InitIndexOnly => transform_ops::init_index_only(&mut tuples[op.i as usize]),
            OpKind::InitFinalMultFromLocal => {
                transform_ops::init_final_mult_from_local(&mut tuples[op.i as usize])
            }
            OpKind::SetJoinAttrFromAttribute => {
                let attr_index = op.params[0] as usize;
                transform_ops::set_join_attr_from_attribute(&mut tuples[op.i as usize], attr_index)?;
            }
            OpKind::ComputeAlignmentKey => {
                transform_ops::compute_alignment_key(&mut tuples[op.i as usize])
            }
        }
    }
    Ok(())
}

/// Splits `tuples` into two disjoint mutable references at positions `i`
/// and `j` (order-independent; panics if `i == j`).
fn two_mut(tuples: &mut [Tuple], i: usize, j: usize) -> (&mut Tuple, &mut Tuple) {
    assert_ne!(i, j, "dispatcher op referenced the same row twice");
    if i < j {
        let (left, right) = tuples.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = tuples.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// As [`two_mut`], but the first operand is read-only at the call sites
/// that use it (window/update operators only ever write into the second).
fn split_ref_mut<'a>(tuples: &'a mut [Tuple], i: usize, j: usize) -> (&'a Tuple, &'a mut Tuple) {
    let (a, b) = two_mut(tuples, i, j);
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::MAX_ATTRIBUTES;

    #[test]
    fn empty_op_list_is_a_no_op() {
        let mut tuples = vec![Tuple::new_source(0, [0; MAX_ATTRIBUTES])];
        let key = Key::new([0u8; 16]);
        let mut counter = NonceCounter::new();
        dispatch(&mut tuples, &[], OpKind::SetLocalMultOne, &key, &mut counter).unwrap();
    }

    #[test]
    fn preserves_is_encrypted_flag_across_a_batch() {
        let key = Key::new([3u8; 16]);
        let mut counter = NonceCounter::new();
        let mut tuples = vec![Tuple::new_source(0, [1; MAX_ATTRIBUTES])];
        crypto::encrypt(&mut tuples[0], &key, &mut counter).unwrap();
        assert!(tuples[0].is_encrypted);
        dispatch(
            &mut tuples,
            &[Op::unary(0)],
            OpKind::SetLocalMultOne,
            &key,
            &mut counter,
        )
        .unwrap();
        assert!(tuples[0].is_encrypted);
    }

    #[test]
    fn set_local_mult_one_runs_through_the_dispatcher() {
        let key = Key::new([0u8; 16]);
        let mut counter = NonceCounter::new();
        let mut tuples = vec![Tuple::new_source(0, [0; MAX_ATTRIBUTES])];
        tuples[0].local_mult = 99;
        dispatch(
            &mut tuples,
            &[Op::unary(0)],
            OpKind::SetLocalMultOne,
            &key,
            &mut counter,
        )
        .unwrap();
        assert_eq!(tuples[0].local_mult, 1);
    }
}

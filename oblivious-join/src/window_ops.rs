//! Dispatcher family (b): window operators. Each is applied to every
//! adjacent pair `(data[i], data[i+1])` during a left-to-right linear pass
//! and writes into the right-hand operand (`expand_copy` also updates the
//! left-hand one, per its own doc comment below). Grounded in
//! `impl/src/enclave/core/window_functions.c`.

use crate::oblivious::cond_select_i64;
use crate::tuple::Tuple;

/// `e2.local_cumsum = e1.local_cumsum + (e2 is SOURCE ? e2.local_mult : 0)`.
pub fn compute_local_sum(e1: &Tuple, e2: &mut Tuple) {
    let contribution = cond_select_i64(0, e2.local_mult, e2.is_source());
    e2.local_cumsum = e1.local_cumsum + contribution;
}

/// If `e1` is START and `e2` is END, `e2.local_interval = e2.local_cumsum -
/// e1.local_cumsum`; otherwise `e2.local_interval` is left unchanged.
pub fn compute_local_interval(e1: &Tuple, e2: &mut Tuple) {
    let active = e1.is_start() && e2.is_end();
    let computed = e2.local_cumsum - e1.local_cumsum;
    e2.local_interval = cond_select_i64(e2.local_interval, computed, active);
}

/// START adds `e2.local_mult` to the running `local_weight`; END subtracts
/// it; SOURCE divides `e2.final_mult` by the current `local_weight` and
/// accumulates into `foreign_sum`. The divisor is replaced by 1 whenever
/// the row is not a SOURCE row, or whenever the running weight is zero (a
/// SOURCE row matching no child interval), so the division is always
/// well-formed; in both cases the accumulation term is masked to zero too.
pub fn compute_foreign_sum(e1: &Tuple, e2: &mut Tuple) {
    let is_start = e2.is_start() as i64;
    let is_end = e2.is_end() as i64;
    let is_source = e2.is_source();

    let weight_delta = is_start * e2.local_mult - is_end * e2.local_mult;
    e2.local_weight = e1.local_weight + weight_delta;

    let divides = is_source && e1.local_weight != 0;
    let safe_denom = cond_select_i64(1, e1.local_weight, divides);
    let contribution = cond_select_i64(0, e2.final_mult / safe_denom, divides);
    e2.foreign_sum = e1.foreign_sum + contribution;
}

/// If `e1` is START and `e2` is END, records `foreign_interval` as the
/// difference of the running `foreign_sum` accumulator and overwrites
/// `e2.foreign_sum` with the *opening* value `e1.foreign_sum` — the child's
/// alignment offset for Phase 4. Otherwise both fields are left unchanged.
pub fn compute_foreign_interval(e1: &Tuple, e2: &mut Tuple) {
    let active = e1.is_start() && e2.is_end();
    let computed_interval = e2.foreign_sum - e1.foreign_sum;
    e2.foreign_interval = cond_select_i64(e2.foreign_interval, computed_interval, active);
    e2.foreign_sum = cond_select_i64(e2.foreign_sum, e1.foreign_sum, active);
}

/// Exclusive prefix sum of `final_mult` into `dst_idx`, used ahead of
/// distribute-and-expand.
pub fn compute_dst_idx(e1: &Tuple, e2: &mut Tuple) {
    e2.dst_idx = e1.dst_idx + e1.final_mult;
}

/// Assigns the consecutive `index` field, `e2.index = e1.index + 1`.
pub fn increment_index(e1: &Tuple, e2: &mut Tuple) {
    e2.index = e1.index + 1;
}

/// Fills a DIST_PADDING slot with a copy of its left neighbor's content and
/// increments that neighbor's `copy_index`, so that each of the
/// `final_mult` copies of an original tuple ends up with a distinct
/// `copy_index` in `[0, final_mult)`. Unlike the other window operators,
/// this one writes both operands: `e1.copy_index` is bumped in place so the
/// next DIST_PADDING slot to the right continues the same run of copies.
pub fn expand_copy(e1: &mut Tuple, e2: &mut Tuple) {
    let is_pad = e2.is_dist_padding();
    e1.copy_index += cond_select_i64(0, 1, is_pad);
    crate::oblivious::cond_assign(e2, &*e1, is_pad);
}

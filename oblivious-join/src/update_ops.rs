//! Dispatcher family (c): update operators. Each is a bulk write from a
//! "carrier" row (the result of a combine/sort/linear-pass sequence) back
//! into a target row of the original table, applied by a parallel pass over
//! two equal-length tables.

use crate::tuple::Tuple;

/// `target.local_mult *= carrier.local_interval` (Phase 1, §4.4 step 8).
pub fn update_target_multiplicity(carrier: &Tuple, target: &mut Tuple) {
    target.local_mult *= carrier.local_interval;
}

/// `target.final_mult = carrier.foreign_interval * target.local_mult;
/// target.foreign_sum = carrier.foreign_sum` (Phase 2, §4.5 step 4).
pub fn update_target_final_multiplicity(carrier: &Tuple, target: &mut Tuple) {
    target.final_mult = carrier.foreign_interval * target.local_mult;
    target.foreign_sum = carrier.foreign_sum;
}

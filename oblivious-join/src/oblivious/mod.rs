//! Branchless primitives whose sequence of memory accesses is a function of
//! input sizes only (§4.2). Every primitive in this module touches every
//! byte of its operands regardless of which branch of its logic "actually"
//! applies; the arithmetic masking pattern, not an `if`, selects the result.

pub mod bitonic;
pub mod cas;
pub mod compactor;
pub mod select_swap;
pub mod shuffle;

pub use cas::{oblivious_cas, oblivious_cas_distribute};
pub use select_swap::{cond_assign, cond_select_i64, cond_swap};

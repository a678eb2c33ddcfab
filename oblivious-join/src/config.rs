//! The configuration surface of §6: a plain, validated data type. Parsing one
//! from a file or environment is left to callers — that would be file I/O or
//! CLI plumbing, both explicit non-goals.

use crate::error::JoinError;
use crate::tuple::MAX_ATTRIBUTES;

/// Hard upper bound on `merge_sort_k`; the external merge sort's heap-merge
/// is only ever instantiated with a fan-in at or below this.
pub const MERGE_SORT_K_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Compile-time payload arity. Must not exceed [`MAX_ATTRIBUTES`].
    pub max_attributes: usize,
    /// Dispatcher batch capacity; also the external-sort threshold.
    pub batch_size: usize,
    /// Fan-in of the external merge, a power of two `<= MERGE_SORT_K_LIMIT`.
    pub merge_sort_k: usize,
    /// Rows buffered per run during an external merge.
    pub merge_buffer_size: usize,
    /// Inverse of the hash index's space overhead parameter.
    pub epsilon_inv: u32,
    /// log2 of the inverse failure probability of the hash index.
    pub delta_inv_log2: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_attributes: MAX_ATTRIBUTES,
            batch_size: 4096,
            merge_sort_k: 8,
            merge_buffer_size: 256,
            epsilon_inv: 8,
            delta_inv_log2: 20,
        }
    }
}

impl Config {
    /// Checks the constraints §6 imposes on each option, returning the first
    /// violation found as an `InvalidArgument`.
    pub fn validate(&self) -> Result<(), JoinError> {
        if self.max_attributes == 0 || self.max_attributes > MAX_ATTRIBUTES {
            return Err(JoinError::InvalidArgument(format!(
                "max_attributes {} out of range (1..={})",
                self.max_attributes, MAX_ATTRIBUTES
            )));
        }
        if self.batch_size == 0 {
            return Err(JoinError::InvalidArgument("batch_size must be >= 1".into()));
        }
        if self.merge_sort_k == 0
            || self.merge_sort_k > MERGE_SORT_K_LIMIT
            || !self.merge_sort_k.is_power_of_two()
        {
            return Err(JoinError::InvalidArgument(format!(
                "merge_sort_k must be a power of two <= {MERGE_SORT_K_LIMIT}, got {}",
                self.merge_sort_k
            )));
        }
        if self.merge_buffer_size == 0 {
            return Err(JoinError::InvalidArgument(
                "merge_buffer_size must be >= 1".into(),
            ));
        }
        if self.epsilon_inv == 0 {
            return Err(JoinError::InvalidArgument("epsilon_inv must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_power_of_two_merge_k() {
        let mut cfg = Config::default();
        cfg.merge_sort_k = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_merge_k_above_limit() {
        let mut cfg = Config::default();
        cfg.merge_sort_k = 16;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut cfg = Config::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());
    }
}

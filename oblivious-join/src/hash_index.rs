//! The oblivious hash index (§4.9): a two-tier build+probe structure used by
//! hop-style lookups over a graph-shaped catalog. Independent of the four
//! join phases — it never touches a `JoinTree` — but shares the crate's
//! oblivious primitives and confidentiality collaborator. Grounded in
//! `examples/original_source/oblivious_hashmap/include/ohash_tiers.hpp`'s
//! `OTwoTierHash` and `prf.hpp`'s `AESPRF`.
//!
//! Simplification vs. the original (see DESIGN.md): `ohash_tiers.hpp` spills
//! overflow into a second `ObliviousBin` built with cuckoo hashing
//! (`ocuckoo_hash.hpp`), so a lookup there does two constant-cost probes (one
//! per tier) with no further scan. Here the overflow tier is a single flat
//! `Vec<Tuple>` scanned linearly on every lookup — still data-independent
//! (every slot is touched every time, real or dummy), just O(overflow size)
//! instead of O(1). Acceptable because overflow is sized to hold only the
//! `1/epsilon_inv` fraction of items a major bin couldn't, not the whole
//! table.

use rand::rngs::StdRng;
use rand::SeedableRng;

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::config::Config;
use crate::oblivious::compactor::oblivious_compact_counted;
use crate::oblivious::select_swap::cond_assign;
use crate::oblivious::shuffle::oblivious_shuffle;
use crate::tuple::{Tuple, MAX_ATTRIBUTES};

/// Routes a `u32` key into `0..range` via AES-128 used as a fixed-key PRF:
/// the key is encrypted as a single 16-byte block and the resulting integer
/// reduced modulo `range`. Grounded in `prf.hpp`'s `AESPRF`.
pub struct Prf {
    cipher: Aes128,
    range: u32,
}

impl Prf {
    pub fn new(seed: [u8; 16], range: u32) -> Self {
        Prf { cipher: Aes128::new(&seed.into()), range: range.max(1) }
    }

    pub fn route(&self, key: u32) -> u32 {
        let mut block = [0u8; 16];
        block[..4].copy_from_slice(&key.to_le_bytes());
        let mut generic = block.into();
        self.cipher.encrypt_block(&mut generic);
        let bytes: [u8; 16] = generic.into();
        let reduced = u32::from_le_bytes(bytes[..4].try_into().unwrap());
        reduced % self.range
    }
}

/// A major bin: a fixed-capacity slot array, padded with dummy
/// (`SortPadding`) tuples up to `bin_capacity`. A lookup always scans the
/// whole bin — the point of sizing it with overwhelming probability is that
/// it very rarely overflows, not that a miss is cheap.
struct MajorBin {
    slots: Vec<Tuple>,
}

impl MajorBin {
    fn lookup(&self, key: u32) -> Tuple {
        let mut found = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
        crate::transform_ops::mark_sort_padding(&mut found);
        for slot in &self.slots {
            let hit = !slot.is_sort_padding() && slot.original_index == key;
            cond_assign(&mut found, slot, hit);
        }
        found
    }
}

/// The two-tier oblivious hash index of §4.9. Built once from a batch of
/// tuples keyed by `original_index`; looked up by the same key afterward.
pub struct ObliviousHashIndex {
    bin_capacity: usize,
    major_bins: Vec<MajorBin>,
    overflow: Vec<Tuple>,
    prf: Prf,
}

impl ObliviousHashIndex {
    /// Builds an index over `data` (consumed). Steps mirror `build()` in
    /// `ohash_tiers.hpp`: shuffle, non-obliviously route each item into its
    /// major bin (justified, as there, by the prior oblivious shuffle — see
    /// FutORAMa, CCS'23), then compact whatever didn't fit into a flat
    /// overflow tier. `config.epsilon_inv` sets the base bin size;
    /// `config.delta_inv_log2` adds the headroom a bin needs to keep the
    /// overflow probability at `2^-delta_inv_log2` (mirroring
    /// `ohash_tiers.hpp`'s `ObliviousBin` constructor, which takes the same
    /// two parameters for its own per-bin capacity).
    pub fn build(mut data: Vec<Tuple>, config: &Config, prf_seed: [u8; 16], shuffle_seed: u64) -> Self {
        let n = data.len();
        let bin_capacity = bin_capacity_for(n, config.epsilon_inv, config.delta_inv_log2).max(1);
        let bin_num = if n == 0 { 1 } else { ((2 * n) / bin_capacity).max(1) };

        let mut rng = StdRng::seed_from_u64(shuffle_seed);
        oblivious_shuffle(&mut data, &mut rng);

        let prf = Prf::new(prf_seed, bin_num as u32);
        let mut buckets: Vec<Vec<Tuple>> = (0..bin_num).map(|_| Vec::new()).collect();
        let mut overflow_candidates: Vec<Tuple> = Vec::new();
        for t in data.into_iter() {
            let bin_id = prf.route(t.original_index) as usize;
            if buckets[bin_id].len() < bin_capacity {
                buckets[bin_id].push(t);
            } else {
                overflow_candidates.push(t);
            }
        }

        let major_bins = buckets
            .into_iter()
            .map(|mut slots| {
                while slots.len() < bin_capacity {
                    let mut dummy = Tuple::new_source(0, [0; MAX_ATTRIBUTES]);
                    crate::transform_ops::mark_sort_padding(&mut dummy);
                    slots.push(dummy);
                }
                MajorBin { slots }
            })
            .collect();

        let kept = oblivious_compact_counted(&mut overflow_candidates, |t| !t.is_sort_padding());
        overflow_candidates.truncate(kept);

        ObliviousHashIndex { bin_capacity, major_bins, overflow: overflow_candidates, prf }
    }

    /// Probes the index for `key`: one constant-cost access to the routed
    /// major bin, plus a full scan of the overflow tier, with the
    /// non-dummy result selected obliviously. Returns `None` when both
    /// probes miss.
    pub fn lookup(&self, key: u32) -> Option<Tuple> {
        let bin_id = self.prf.route(key) as usize;
        let mut result = self.major_bins[bin_id].lookup(key);

        for t in &self.overflow {
            let hit = t.original_index == key && !t.is_sort_padding();
            cond_assign(&mut result, t, hit);
        }

        if result.is_sort_padding() {
            None
        } else {
            Some(result)
        }
    }

    /// Recovers every real item the index holds, via flagged compaction
    /// over every major bin plus the overflow tier (§4.9's `extract`).
    pub fn extract(&self) -> Vec<Tuple> {
        let mut all: Vec<Tuple> = self.major_bins.iter().flat_map(|b| b.slots.iter().cloned()).collect();
        all.extend(self.overflow.iter().cloned());
        let kept = oblivious_compact_counted(&mut all, |t| !t.is_sort_padding());
        all.truncate(kept);
        all
    }

    pub fn bin_capacity(&self) -> usize {
        self.bin_capacity
    }
}

/// `ceil(n / epsilon_inv) * 2`, plus `delta_inv_log2` extra slots of
/// headroom — a larger failure-probability exponent buys a larger bin,
/// the same direction of effect `ohash_tiers.hpp`'s per-bin capacity has.
fn bin_capacity_for(n: usize, epsilon_inv: u32, delta_inv_log2: u32) -> usize {
    if n == 0 {
        return 1;
    }
    (n / (epsilon_inv.max(1) as usize)).max(1) * 2 + delta_inv_log2 as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: u32, payload: i64) -> Tuple {
        let mut t = Tuple::new_source(key, [0; MAX_ATTRIBUTES]);
        t.attributes[0] = payload;
        t
    }

    fn config(epsilon_inv: u32) -> Config {
        Config { epsilon_inv, delta_inv_log2: 0, ..Config::default() }
    }

    #[test]
    fn build_then_lookup_finds_every_inserted_key() {
        let rows: Vec<Tuple> = (0..40u32).map(|k| row(k, k as i64 * 10)).collect();
        let index = ObliviousHashIndex::build(rows, &config(4), [9u8; 16], 11);

        for k in 0..40u32 {
            let found = index.lookup(k).expect("key should be present");
            assert_eq!(found.original_index, k);
            assert_eq!(found.attributes[0], k as i64 * 10);
        }
    }

    #[test]
    fn lookup_of_an_absent_key_is_none() {
        let rows: Vec<Tuple> = (0..10u32).map(|k| row(k, 0)).collect();
        let index = ObliviousHashIndex::build(rows, &config(4), [3u8; 16], 5);
        assert!(index.lookup(999).is_none());
    }

    #[test]
    fn extract_recovers_every_real_item_regardless_of_bin_placement() {
        let rows: Vec<Tuple> = (0..25u32).map(|k| row(k, k as i64)).collect();
        let index = ObliviousHashIndex::build(rows, &config(2), [5u8; 16], 99);

        let mut extracted: Vec<u32> = index.extract().iter().map(|t| t.original_index).collect();
        extracted.sort_unstable();
        let want: Vec<u32> = (0..25u32).collect();
        assert_eq!(extracted, want);
    }

    #[test]
    fn larger_delta_inv_log2_grows_bin_capacity() {
        let narrow = bin_capacity_for(100, 4, 0);
        let wide = bin_capacity_for(100, 4, 20);
        assert!(wide > narrow);
    }

    #[test]
    fn prf_routes_deterministically_for_a_fixed_key() {
        let prf = Prf::new([1u8; 16], 7);
        let a = prf.route(42);
        let b = prf.route(42);
        assert_eq!(a, b);
        assert!(a < 7);
    }

    #[test]
    fn empty_build_yields_no_lookups() {
        let index = ObliviousHashIndex::build(Vec::new(), &config(4), [0u8; 16], 0);
        assert!(index.lookup(0).is_none());
        assert!(index.extract().is_empty());
    }
}

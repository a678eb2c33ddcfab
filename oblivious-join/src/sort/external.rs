//! k-way merge sort (§4.8): tables larger than the dispatcher's batch
//! capacity are split into runs of at most `batch_size`, each sorted
//! internally with one batched bitonic pass, then merged in rounds of at
//! most `merge_sort_k` runs. Only bucket (run) sizes are public here —
//! unlike the bitonic network, the merge step compares run fronts directly
//! and is not itself oblivious; §4.8 restricts its use to contexts where
//! that is acceptable.

use std::collections::VecDeque;

use crate::comparators::ComparatorKind;
use crate::config::Config;
use crate::crypto::{Key, NonceCounter};
use crate::dispatch;
use crate::error::JoinError;
use crate::oblivious::bitonic::bitonic_sort;
use crate::oblivious::cas::CompareFn;
use crate::tuple::Tuple;

/// One sorted run, buffered behind a `VecDeque` front. `merge_buffer_size`
/// governs how many rows a real refill callback would pull from storage at
/// a time; since runs here already live in memory, `Run` stands in for
/// that buffering without a separate refill step.
struct Run {
    remaining: VecDeque<Tuple>,
}

impl Run {
    fn peek(&self) -> Option<&Tuple> {
        self.remaining.front()
    }

    fn pop(&mut self) -> Option<Tuple> {
        self.remaining.pop_front()
    }
}

/// Persistent merge state: `init` takes ownership of a fixed set of sorted
/// runs (at most `merge_sort_k` of them per round), `process` drains them
/// into one sorted `Vec` by repeatedly taking the minimum run front,
/// `cleanup` releases the buffers. A real implementation's refill/flush
/// callbacks are plain closures (§9); none are needed here since the whole
/// table already lives in memory.
pub struct MergeState {
    runs: Vec<Run>,
    cmp: CompareFn,
}

impl MergeState {
    pub fn init(sorted_runs: Vec<Vec<Tuple>>, cmp: CompareFn) -> Self {
        let runs = sorted_runs
            .into_iter()
            .map(|r| Run { remaining: r.into() })
            .collect();
        MergeState { runs, cmp }
    }

    pub fn process(mut self) -> Vec<Tuple> {
        let total: usize = self.runs.iter().map(|r| r.remaining.len()).sum();
        let mut output = Vec::with_capacity(total);
        loop {
            let mut best: Option<(usize, Tuple)> = None;
            for (idx, run) in self.runs.iter().enumerate() {
                if let Some(candidate) = run.peek() {
                    let better = match &best {
                        None => true,
                        Some((_, cur)) => (self.cmp)(candidate, cur) < 0,
                    };
                    if better {
                        best = Some((idx, *candidate));
                    }
                }
            }
            match best {
                Some((idx, _)) => output.push(self.runs[idx].pop().unwrap()),
                None => break,
            }
        }
        self.cleanup();
        output
    }

    pub fn cleanup(&mut self) {
        self.runs.clear();
    }
}

/// Sorts `rows` by `kind`, splitting into batch-sized runs, sorting each
/// run through the dispatcher's confidentiality boundary once, then
/// merging in rounds of at most `config.merge_sort_k` runs until a single
/// run remains.
pub fn sort_large(
    rows: &mut Vec<Tuple>,
    kind: ComparatorKind,
    config: &Config,
    key: &Key,
    counter: &mut NonceCounter,
) -> Result<(), JoinError> {
    let cmp = kind.compare_fn().ok_or_else(|| {
        JoinError::InvalidArgument("DISTRIBUTE has no total order and cannot be used with sort_large".into())
    })?;
    let batch = config.batch_size.max(1);

    let mut remaining = std::mem::take(rows);
    let mut sorted_runs: Vec<Vec<Tuple>> = Vec::new();
    while !remaining.is_empty() {
        let split_at = batch.min(remaining.len());
        let mut run: Vec<Tuple> = remaining.drain(..split_at).collect();
        dispatch::with_decrypted(&mut run, key, counter, |plain| {
            let mut owned = plain.to_vec();
            bitonic_sort(&mut owned, cmp);
            plain.copy_from_slice(&owned);
            Ok(())
        })?;
        sorted_runs.push(run);
    }

    let k = config.merge_sort_k.max(1);
    while sorted_runs.len() > 1 {
        let mut next_round = Vec::with_capacity(sorted_runs.len().div_ceil(k));
        for chunk in sorted_runs.chunks(k) {
            next_round.push(MergeState::init(chunk.to_vec(), cmp).process());
        }
        sorted_runs = next_round;
    }

    *rows = sorted_runs.pop().unwrap_or_default();
    Ok(())
}

// src/blocking/indexer.rs
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::blocking::sampling::{derive_seed, seeded_sample};
use crate::blocking::strategy::{BlockKey, BlockingStrategy};
use crate::models::{CandidatePair, Record, RecordId};

/// Memory governance for blocking. `bucket_cap` bounds how many records of
/// each side a single bucket may contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingLimits {
    pub bucket_cap: Option<usize>,
    pub seed: u64,
}

impl Default for BlockingLimits {
    fn default() -> Self {
        Self {
            bucket_cap: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockingStats {
    pub left_excluded: usize,
    pub right_excluded: usize,
    pub buckets: usize,
    pub shared_buckets: usize,
    pub capped_buckets: usize,
    pub largest_bucket_pairs: usize,
    pub candidates: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BlockingOutput {
    /// Sorted by (left_id, right_id), no duplicates.
    pub candidates: Vec<CandidatePair>,
    pub stats: BlockingStats,
}

#[derive(Default)]
struct Bucket<'a> {
    left: Vec<&'a RecordId>,
    right: Vec<&'a RecordId>,
}

/// Groups both sides by `key_fn` and emits the cross product of every bucket
/// that has records on both sides. Records whose key is `None` or empty are
/// excluded and counted, never compared against everything.
pub fn block<F>(left: &[Record], right: &[Record], key_fn: F, limits: &BlockingLimits) -> BlockingOutput
where
    F: Fn(&Record) -> Option<BlockKey>,
{
    let mut stats = BlockingStats::default();
    if left.is_empty() || right.is_empty() {
        debug!("Blocking: one side is empty, no candidates");
        return BlockingOutput {
            candidates: Vec::new(),
            stats,
        };
    }

    // BTreeMap keeps bucket visiting order independent of hashing
    let mut buckets: BTreeMap<BlockKey, Bucket<'_>> = BTreeMap::new();

    for record in left {
        match key_fn(record).filter(|k| !k.is_empty()) {
            Some(key) => buckets.entry(key).or_default().left.push(&record.id),
            None => stats.left_excluded += 1,
        }
    }
    for record in right {
        match key_fn(record).filter(|k| !k.is_empty()) {
            Some(key) => {
                // right-only keys can never produce a pair
                if let Some(bucket) = buckets.get_mut(&key) {
                    bucket.right.push(&record.id);
                }
            }
            None => stats.right_excluded += 1,
        }
    }
    stats.buckets = buckets.len();

    let mut candidates = Vec::new();
    for (key, bucket) in buckets {
        if bucket.left.is_empty() || bucket.right.is_empty() {
            continue;
        }
        stats.shared_buckets += 1;

        let key_label = key.components().join("|");
        let (lefts, left_capped) = cap_side(bucket.left, limits, &key_label, "L");
        let (rights, right_capped) = cap_side(bucket.right, limits, &key_label, "R");
        if left_capped || right_capped {
            stats.capped_buckets += 1;
            debug!(
                "Blocking: bucket [{}] capped to {}x{} records",
                key_label,
                lefts.len(),
                rights.len()
            );
        }

        let bucket_pairs = lefts.len() * rights.len();
        stats.largest_bucket_pairs = stats.largest_bucket_pairs.max(bucket_pairs);
        candidates.reserve(bucket_pairs);
        for l in &lefts {
            for r in &rights {
                candidates.push(CandidatePair::new((*l).clone(), (*r).clone()));
            }
        }
    }

    candidates.sort();
    candidates.dedup();
    stats.candidates = candidates.len();

    if stats.left_excluded > 0 || stats.right_excluded > 0 {
        warn!(
            "Blocking: excluded {} left and {} right records with incomplete keys",
            stats.left_excluded, stats.right_excluded
        );
    }
    if stats.capped_buckets > 0 {
        warn!(
            "Blocking: {} oversized buckets were capped (bucket cap {:?})",
            stats.capped_buckets, limits.bucket_cap
        );
    }

    BlockingOutput { candidates, stats }
}

/// Convenience wrapper binding a named strategy's key function.
pub fn block_with_strategy(
    left: &[Record],
    right: &[Record],
    strategy: BlockingStrategy,
    limits: &BlockingLimits,
) -> BlockingOutput {
    let output = block(left, right, |r| strategy.key(r), limits);
    info!(
        "Blocking [{}]: {} left x {} right records -> {} candidates in {} shared buckets",
        strategy,
        left.len(),
        right.len(),
        output.stats.candidates,
        output.stats.shared_buckets
    );
    output
}

fn cap_side<'a>(
    mut ids: Vec<&'a RecordId>,
    limits: &BlockingLimits,
    key_label: &str,
    side: &str,
) -> (Vec<&'a RecordId>, bool) {
    ids.sort();
    match limits.bucket_cap {
        Some(cap) if ids.len() > cap => {
            let seed = derive_seed(limits.seed, &["bucket", key_label, side]);
            (seeded_sample(&ids, cap, seed), true)
        }
        _ => (ids, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::strategy::block_key;
    use crate::models::{Field, Source};

    fn left(id: &str, make: &str, year: &str) -> Record {
        Record::new(id, Source::Left)
            .with(Field::Make, make)
            .with(Field::Year, year)
    }

    fn right(id: &str, make: &str, year: &str) -> Record {
        Record::new(id, Source::Right)
            .with(Field::Make, make)
            .with(Field::Year, year)
    }

    #[test]
    fn emits_only_same_block_pairs() {
        let lefts = vec![left("1", "toyota", "2019"), left("2", "ford", "2018")];
        let rights = vec![
            right("10", "toyota", "2019"),
            right("11", "ford", "2018"),
            right("12", "ford", "2017"),
        ];
        let out = block_with_strategy(&lefts, &rights, BlockingStrategy::MakeYear, &BlockingLimits::default());
        assert_eq!(
            out.candidates,
            vec![CandidatePair::new("1", "10"), CandidatePair::new("2", "11")]
        );
        for pair in &out.candidates {
            let l = lefts.iter().find(|r| r.id == pair.left_id).unwrap();
            let r = rights.iter().find(|r| r.id == pair.right_id).unwrap();
            assert_eq!(BlockingStrategy::MakeYear.key(l), BlockingStrategy::MakeYear.key(r));
        }
    }

    #[test]
    fn incomplete_keys_are_excluded() {
        let lefts = vec![Record::new("1", Source::Left).with(Field::Make, "toyota")];
        let rights = vec![right("10", "toyota", "2019")];
        let out = block_with_strategy(&lefts, &rights, BlockingStrategy::MakeYear, &BlockingLimits::default());
        assert!(out.candidates.is_empty());
        assert_eq!(out.stats.left_excluded, 1);
    }

    #[test]
    fn empty_inputs_and_empty_key_yield_nothing() {
        let rights = vec![right("10", "toyota", "2019")];
        let out = block(&[], &rights, |r| BlockingStrategy::MakeYear.key(r), &BlockingLimits::default());
        assert!(out.candidates.is_empty());

        let lefts = vec![left("1", "toyota", "2019")];
        let out = block(&lefts, &rights, |r| block_key(r, &[]), &BlockingLimits::default());
        assert!(out.candidates.is_empty());
    }

    #[test]
    fn oversized_buckets_are_capped_deterministically() {
        let lefts: Vec<Record> = (0..50).map(|i| left(&format!("l{:02}", i), "ford", "2018")).collect();
        let rights: Vec<Record> = (0..40).map(|i| right(&format!("r{:02}", i), "ford", "2018")).collect();
        let limits = BlockingLimits {
            bucket_cap: Some(5),
            seed: 9,
        };
        let first = block_with_strategy(&lefts, &rights, BlockingStrategy::MakeYear, &limits);
        let second = block_with_strategy(&lefts, &rights, BlockingStrategy::MakeYear, &limits);
        assert_eq!(first.candidates.len(), 25);
        assert_eq!(first.stats.capped_buckets, 1);
        assert_eq!(first.candidates, second.candidates);

        let other_seed = block_with_strategy(
            &lefts,
            &rights,
            BlockingStrategy::MakeYear,
            &BlockingLimits {
                bucket_cap: Some(5),
                seed: 10,
            },
        );
        assert_ne!(first.candidates, other_seed.candidates);
    }
}

// src/matching/resolver.rs
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{MatchSet, RecordId, ScoredPair};

/// Keeps pairs scoring at or above `threshold`. NaN scores never pass.
pub fn filter_above(scored: Vec<ScoredPair>, threshold: f64) -> Vec<ScoredPair> {
    scored.into_iter().filter(|p| p.score >= threshold).collect()
}

/// Greedy 1:1 assignment. Pairs are visited by score descending, ties by
/// (left_id, right_id), and accepted only if neither endpoint is claimed yet.
///
/// Not a maximum-weight bipartite matching: claiming the best pair first can
/// block two slightly lighter pairs whose combined score is larger.
/// Non-finite scores are skipped.
pub fn resolve(scored: Vec<ScoredPair>) -> MatchSet {
    let considered = scored.len();
    let (mut scored, non_finite): (Vec<ScoredPair>, Vec<ScoredPair>) =
        scored.into_iter().partition(|p| p.score.is_finite());
    if !non_finite.is_empty() {
        warn!("Resolver: skipped {} pairs with non-finite scores", non_finite.len());
    }
    scored.sort_by(resolution_order);

    let mut claimed_left: HashSet<RecordId> = HashSet::new();
    let mut claimed_right: HashSet<RecordId> = HashSet::new();
    let mut accepted = Vec::new();

    for candidate in scored {
        if claimed_left.contains(&candidate.pair.left_id) || claimed_right.contains(&candidate.pair.right_id) {
            continue;
        }
        claimed_left.insert(candidate.pair.left_id.clone());
        claimed_right.insert(candidate.pair.right_id.clone());
        accepted.push(candidate);
    }

    let rejected = considered - non_finite.len() - accepted.len();
    if rejected > 0 {
        debug!("Resolver: rejected {} pairs whose endpoint was already claimed", rejected);
    }
    info!(
        "Resolver: {} scored pairs -> {} one-to-one matches",
        considered,
        accepted.len()
    );
    MatchSet::from_accepted(accepted)
}

fn resolution_order(a: &ScoredPair, b: &ScoredPair) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.pair.left_id.cmp(&b.pair.left_id))
        .then_with(|| a.pair.right_id.cmp(&b.pair.right_id))
}
